//! Local level synthesis.
//!
//! The availability floor of the service: whenever the provider path cannot
//! produce a valid level, one is synthesized here with no external calls.
//! Variant choice is an explicit weighted ladder over a single uniform roll
//! (see [`recipe_for_roll`]); the generator owns a seedable RNG so tests can
//! pin the stream.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::level::{BanterLine, Level, LevelBody, Persona};
use crate::params::Language;
use crate::schema;

/// Which kind of content a fallback roll produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recipe {
    /// Multiple choice from the curated bank.
    CuratedQuiz,
    /// Fixed true/false question.
    TrueFalse,
    /// Fresh mental arithmetic.
    MentalMath,
    /// Reflex target.
    Reflex,
    /// Avoid the bomb.
    AvoidBomb,
    /// Tap sprint.
    TapSprint,
    /// Joke from the bank.
    Joke,
}

/// Upper bounds (exclusive) of each rung; rolls past the last rung are jokes.
pub const LADDER: [(f64, Recipe); 6] = [
    (0.30, Recipe::CuratedQuiz),
    (0.44, Recipe::TrueFalse),
    (0.58, Recipe::MentalMath),
    (0.70, Recipe::Reflex),
    (0.80, Recipe::AvoidBomb),
    (0.90, Recipe::TapSprint),
];

/// Map a roll in `[0, 1)` to a recipe.
pub fn recipe_for_roll(roll: f64) -> Recipe {
    LADDER
        .iter()
        .find(|(bound, _)| roll < *bound)
        .map(|(_, recipe)| *recipe)
        .unwrap_or(Recipe::Joke)
}

struct CuratedQuiz {
    q: &'static str,
    options: [&'static str; 3],
    correct: usize,
    joke: &'static str,
}

struct Bank {
    jokes: &'static [&'static str],
    quiz: &'static [CuratedQuiz],
}

const IT_BANK: Bank = Bank {
    jokes: &[
        "Il bug non è un insetto: è una feature con autostima.",
        "Questo non è un errore: è un KPI che si ribella.",
        "Se fallisci, non è grave. È solo… documentato.",
        "Ho chiesto al server come stava. Mi ha risposto 503.",
    ],
    quiz: &[
        CuratedQuiz {
            q: "Cosa beve un computer?",
            options: ["Acqua", "Screenshots", "Caffè Java"],
            correct: 1,
            joke: "Speriamo non si bagni.",
        },
        CuratedQuiz {
            q: "Qual è il colmo per un fantasma?",
            options: ["Avere i bollenti spiriti", "Essere trasparente", "Non avere lenzuola"],
            correct: 0,
            joke: "Buh!",
        },
        CuratedQuiz {
            q: "Gigetto è intelligente?",
            options: ["Sì, molto", "No, è stupido", "È solo codice"],
            correct: 0,
            joke: "Ottima risposta umano.",
        },
        CuratedQuiz {
            q: "Dove si nasconde un bug il lunedì?",
            options: ["Nel codice di venerdì", "Nel caffè", "Nel calendario"],
            correct: 0,
            joke: "Il venerdì si scrive, il lunedì si paga.",
        },
    ],
};

const EN_BANK: Bank = Bank {
    jokes: &[
        "A bug is just a feature with confidence issues.",
        "My code works, on alternate Tuesdays.",
        "If you fail, it's not bad. It's… logged.",
        "I asked the server how it felt. It said 503.",
    ],
    quiz: &[
        CuratedQuiz {
            q: "What does a computer drink?",
            options: ["Water", "Screenshots", "Java Coffee"],
            correct: 1,
            joke: "Hope it doesn't spill.",
        },
        CuratedQuiz {
            q: "Where do bugs hide on Monday?",
            options: ["In Friday's code", "In the coffee", "In the calendar"],
            correct: 0,
            joke: "Friday writes it, Monday pays for it.",
        },
        CuratedQuiz {
            q: "Why did the developer go broke?",
            options: ["Used up all the cache", "Bought a GPU", "Paid for RAM"],
            correct: 0,
            joke: "Cash, cache. Same problem.",
        },
    ],
};

fn bank(lang: Language) -> &'static Bank {
    match lang {
        Language::It => &IT_BANK,
        Language::En => &EN_BANK,
    }
}

const REFLEX_ICONS: [&str; 3] = ["🐱", "🎯", "⚡"];

/// Seedable synthesizer of valid levels.
pub struct FallbackGenerator {
    rng: Mutex<StdRng>,
}

impl FallbackGenerator {
    /// Generator with a fixed seed; same seed, same stream of levels.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Generator seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Synthesize a level: roll the ladder, then build that recipe.
    ///
    /// Never fails. Always spoken by the default persona.
    pub fn synthesize(&self, lang: Language) -> Level {
        let mut rng = self.rng.lock();
        let recipe = recipe_for_roll(rng.gen::<f64>());
        build(recipe, lang, &mut *rng)
    }

    /// Build a specific recipe, skipping the roll.
    pub fn synthesize_recipe(&self, recipe: Recipe, lang: Language) -> Level {
        let mut rng = self.rng.lock();
        build(recipe, lang, &mut *rng)
    }
}

impl Default for FallbackGenerator {
    fn default() -> Self {
        Self::from_entropy()
    }
}

fn build<R: Rng>(recipe: Recipe, lang: Language, rng: &mut R) -> Level {
    let bank = bank(lang);
    let (body, joke) = match recipe {
        Recipe::CuratedQuiz => {
            // Banks are non-empty constants.
            let quiz = &bank.quiz[rng.gen_range(0..bank.quiz.len())];
            (
                LevelBody::QuizMcq {
                    q: quiz.q.to_string(),
                    options: quiz.options.iter().map(|s| s.to_string()).collect(),
                    correct: quiz.correct,
                },
                quiz.joke,
            )
        }
        Recipe::TrueFalse => (
            LevelBody::QuizTf {
                q: lang.pick("Il JavaScript è Java.", "JavaScript is Java.").to_string(),
                answer: false,
            },
            lang.pick("No. È marketing anni '90.", "No. It's 90s marketing."),
        ),
        Recipe::MentalMath => {
            let a: i64 = rng.gen_range(1..=9);
            let b: i64 = rng.gen_range(1..=9);
            let (op, ans) = if rng.gen_bool(0.5) {
                ('+', a + b)
            } else {
                ('-', a - b)
            };
            let q = match lang {
                Language::It => format!("Quanto fa {a} {op} {b}?"),
                Language::En => format!("What is {a} {op} {b}?"),
            };
            let mut options: Vec<String> =
                [ans, ans + 1, ans - 1].iter().map(i64::to_string).collect();
            options.shuffle(rng);
            let correct = schema::math_correct_index(&q, &options);
            (
                LevelBody::QuizMath { q, options, correct },
                lang.pick("Calcolo mentale. Niente Excel.", "Mental math. No Excel."),
            )
        }
        Recipe::Reflex => (
            LevelBody::ReflexMove {
                q: lang.pick("PRENDI IL BERSAGLIO!", "CATCH THE TARGET!").to_string(),
                target_icon: REFLEX_ICONS[rng.gen_range(0..REFLEX_ICONS.len())].to_string(),
                duration: 3000,
            },
            lang.pick(
                "I tuoi riflessi hanno bisogno di funding.",
                "Your reflexes need funding.",
            ),
        ),
        Recipe::AvoidBomb => {
            let buttons = 6;
            (
                LevelBody::AvoidBomb {
                    q: Some(
                        lang.pick("CLICCA… MA NON LA BOMBA 💣", "CLICK… BUT NOT THE BOMB 💣")
                            .to_string(),
                    ),
                    buttons,
                    bomb_index: rng.gen_range(0..buttons),
                    duration: 3500,
                },
                lang.pick("Boom = report mensile.", "Boom = monthly report."),
            )
        }
        Recipe::TapSprint => (
            LevelBody::TapSprint {
                q: Some(lang.pick("TAPPA 12 VOLTE!", "TAP 12 TIMES!").to_string()),
                taps_required: 12,
                duration: 3500,
            },
            lang.pick("Questo è cardio da pollice.", "Thumb cardio."),
        ),
        Recipe::Joke => (
            LevelBody::JokeBreak {
                text: bank.jokes[rng.gen_range(0..bank.jokes.len())].to_string(),
            },
            lang.pick(
                "Ridi o ti metto in backlog.",
                "Laugh or I put you in the backlog.",
            ),
        ),
    };
    Level::new(Persona::default(), body, Some(joke.to_string()))
}

/// Canned level served when a client is over its request quota.
pub fn rate_limited(lang: Language) -> Level {
    Level::new(
        Persona::default(),
        LevelBody::JokeBreak {
            text: lang
                .pick(
                    "Rate limit. Respira. Poi riprova. (Io intanto fatturo.)",
                    "Rate limit. Breathe. Then try again. (I'll be invoicing meanwhile.)",
                )
                .to_string(),
        },
        Some(
            lang.pick(
                "Troppa foga. Troppo poco budget.",
                "Too much hustle. Too little budget.",
            )
            .to_string(),
        ),
    )
}

/// Canned duel banter: persona A taunts, persona B answers.
pub fn duel_banter(lang: Language) -> Vec<BanterLine> {
    vec![
        BanterLine::new(
            Persona::Gigetto,
            lang.pick(
                "Ok. Vediamo se oggi impari.",
                "Alright. Let's see if you learn today.",
            ),
        ),
        BanterLine::new(
            Persona::Gigetta,
            lang.pick(
                "Respira. Adesso vinci con stile.",
                "Breathe. Now win with style.",
            ),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::LevelKind;
    use crate::params::SpeakerMode;
    use std::collections::HashSet;

    #[test]
    fn test_ladder_boundaries() {
        assert_eq!(recipe_for_roll(0.0), Recipe::CuratedQuiz);
        assert_eq!(recipe_for_roll(0.2999), Recipe::CuratedQuiz);
        assert_eq!(recipe_for_roll(0.30), Recipe::TrueFalse);
        assert_eq!(recipe_for_roll(0.44), Recipe::MentalMath);
        assert_eq!(recipe_for_roll(0.58), Recipe::Reflex);
        assert_eq!(recipe_for_roll(0.70), Recipe::AvoidBomb);
        assert_eq!(recipe_for_roll(0.80), Recipe::TapSprint);
        assert_eq!(recipe_for_roll(0.90), Recipe::Joke);
        assert_eq!(recipe_for_roll(0.9999), Recipe::Joke);
    }

    #[test]
    fn test_same_seed_same_stream() {
        let a = FallbackGenerator::seeded(7);
        let b = FallbackGenerator::seeded(7);
        for _ in 0..50 {
            let (la, lb) = (a.synthesize(Language::En), b.synthesize(Language::En));
            assert_eq!(la.body, lb.body);
            assert_eq!(la.joke, lb.joke);
        }
    }

    #[test]
    fn test_every_recipe_passes_schema() {
        let generator = FallbackGenerator::seeded(1);
        for lang in [Language::It, Language::En] {
            for (_, recipe) in LADDER.iter().copied().chain([(1.0, Recipe::Joke)]) {
                for _ in 0..20 {
                    let level = generator.synthesize_recipe(recipe, lang);
                    let json = serde_json::to_value(&level).unwrap();
                    let checked = schema::validate(&json, lang, SpeakerMode::Auto)
                        .unwrap_or_else(|e| panic!("{recipe:?} produced invalid level: {e}"));
                    assert_eq!(checked.body, level.body);
                    assert_eq!(level.speaker, Persona::Gigetto);
                }
            }
        }
    }

    #[test]
    fn test_mental_math_correct_index_points_at_answer() {
        for seed in 0..200 {
            let level = FallbackGenerator::seeded(seed).synthesize_recipe(Recipe::MentalMath, Language::En);
            let LevelBody::QuizMath { q, options, correct } = level.body else {
                panic!("expected quiz_math");
            };
            let expected = schema::evaluate_expression(&q).unwrap();
            assert_eq!(options[correct].parse::<i64>().unwrap(), expected, "seed {seed}: {q}");
        }
    }

    #[test]
    fn test_all_recipes_reachable() {
        let generator = FallbackGenerator::seeded(99);
        let kinds: HashSet<LevelKind> = (0..2000)
            .map(|_| generator.synthesize(Language::It).kind())
            .collect();
        assert_eq!(kinds.len(), 7);
        assert!(!kinds.contains(&LevelKind::MemoryPair));
    }

    #[test]
    fn test_curated_banks_lead_with_core_entries() {
        let it: Vec<&str> = IT_BANK.quiz.iter().map(|c| c.q).collect();
        assert_eq!(
            &it[..3],
            ["Cosa beve un computer?", "Qual è il colmo per un fantasma?", "Gigetto è intelligente?"]
        );
        assert_eq!(IT_BANK.quiz[2].options[IT_BANK.quiz[2].correct], "Sì, molto");
        assert_eq!(EN_BANK.quiz[0].q, "What does a computer drink?");
        for quiz in IT_BANK.quiz.iter().chain(EN_BANK.quiz) {
            assert!(quiz.correct < 3, "{}", quiz.q);
        }
    }

    #[test]
    fn test_rate_limited_is_joke_in_language() {
        let it = rate_limited(Language::It);
        let en = rate_limited(Language::En);
        assert_eq!(it.kind(), LevelKind::JokeBreak);
        assert!(matches!(it.body, LevelBody::JokeBreak { ref text } if text.starts_with("Rate limit. Respira")));
        assert_ne!(it.body, en.body);
    }

    #[test]
    fn test_duel_banter_is_well_formed() {
        for lang in [Language::It, Language::En] {
            let mut level = rate_limited(lang);
            level.banter = Some(duel_banter(lang));
            assert!(level.has_valid_duel_banter());
        }
    }
}
