//! Prompt composition for the content provider.

use std::fmt::Write as _;

use crate::level::LevelKind;
use crate::params::{Language, RequestParameters, Topic};

/// JSON shape advertised for each level kind.
fn shape(kind: LevelKind) -> &'static str {
    match kind {
        LevelKind::QuizMcq => r#"{ "id": number, "speaker": "gigetto"|"gigetta", "type": "quiz_mcq", "q": string, "options": [s, s, s], "correct": 0|1|2, "joke": string }"#,
        LevelKind::QuizTf => r#"{ "id": number, "speaker": "gigetto"|"gigetta", "type": "quiz_tf", "q": string, "answer": true|false, "joke": string }"#,
        LevelKind::QuizOrder => r#"{ "id": number, "speaker": "gigetto"|"gigetta", "type": "quiz_order", "q": string, "items": [3..6 strings], "correctOrder": [indices], "joke": string }"#,
        LevelKind::QuizFill => r#"{ "id": number, "speaker": "gigetto"|"gigetta", "type": "quiz_fill", "q": string with __ as the blank, "answer": string, "joke": string }"#,
        LevelKind::QuizMath => r#"{ "id": number, "speaker": "gigetto"|"gigetta", "type": "quiz_math", "q": string like "7 + 5", "options": [s, s, s], "joke": string }"#,
        LevelKind::ReflexMove => r#"{ "id": number, "speaker": "gigetto"|"gigetta", "type": "reflex_move", "q": string, "targetIcon": "🐱"|"🎯"|"⚡", "duration": 2000..5000, "joke": string }"#,
        LevelKind::AvoidBomb => r#"{ "id": number, "speaker": "gigetto"|"gigetta", "type": "avoid_bomb", "q": string, "buttons": 4..9, "bombIndex": 0..buttons-1, "duration": 2000..5000, "joke": string }"#,
        LevelKind::TapSprint => r#"{ "id": number, "speaker": "gigetto"|"gigetta", "type": "tap_sprint", "q": string, "tapsRequired": 6..25, "duration": 2000..6000, "joke": string }"#,
        LevelKind::MemoryPair => r#"{ "id": number, "speaker": "gigetto"|"gigetta", "type": "memory_pair", "q": string, "cards": [even count 6..16 of emoji], "joke": string }"#,
        LevelKind::JokeBreak => r#"{ "id": number, "speaker": "gigetto"|"gigetta", "type": "joke_break", "text": string, "joke": string }"#,
    }
}

fn topic_hint(topic: Topic) -> &'static str {
    match topic {
        Topic::Kids => "super-safe, simple content for children",
        Topic::Tech => "prefer coding, tech and business references",
        Topic::General => "everyday humour",
        Topic::Mixed => "a balanced mix",
    }
}

/// Compose the provider prompt.
///
/// `recent` lists kinds served lately for the same partition; they are
/// named so the model steers away from them.
pub fn build_prompt(params: &RequestParameters, recent: &[LevelKind]) -> String {
    let mut out = String::with_capacity(4096);

    out.push_str("OUTPUT: exactly ONE JSON object, no markdown, no extra text.\n");
    let _ = writeln!(
        out,
        "Language: {}.",
        params.lang.pick("Italian", "English")
    );
    let _ = writeln!(
        out,
        "Difficulty: {} (easy = simpler, hard = nastier and faster).",
        params.difficulty
    );
    let _ = writeln!(out, "Topic: {} ({}).", params.topic, topic_hint(params.topic));
    let _ = writeln!(
        out,
        "Mood: {} (soft = gentle irony, medium = light sarcasm, savage = cynical and challenging, never offensive).",
        params.mood
    );
    let _ = writeln!(
        out,
        "SpeakerMode: {} (auto = pick freely; gigetto = always gigetto; gigetta = always gigetta; duel = both).",
        params.speaker_mode
    );

    out.push_str(
        "\nPERSONAS:\n\
         - gigetto: cynical coach, quick and witty; the \"joke\" field is short, sharp and motivating.\n\
         - gigetta: witty rival, bright and empathetic but pointed; the \"joke\" makes the player want another round.\n\
         Always include \"speaker\". No hate, no profanity, family-friendly.\n",
    );

    out.push_str("\nChoose ONE of these types:\n");
    for kind in LevelKind::ALL {
        let _ = writeln!(out, "- {kind}: {}", shape(kind));
    }

    out.push_str(
        "\nOptional for duel mode: \"banter\": [{\"speaker\":\"gigetto\",\"text\":string},{\"speaker\":\"gigetta\",\"text\":string}], \
         gigetto first, each line at most 120 characters.\n",
    );
    out.push_str("id = current Unix time in milliseconds. Short, punchy, fun. Vary the type often.\n");

    if !recent.is_empty() {
        let names: Vec<&str> = recent.iter().map(|k| k.as_str()).collect();
        let _ = writeln!(
            out,
            "Avoid these types, they were just used: {}.",
            names.join(", ")
        );
    }

    out.push('\n');
    out.push_str(match params.lang {
        Language::It => "Generate a new, original level. Write every player-facing string in Italian. JSON only.",
        Language::En => "Generate a new, original level. Write every player-facing string in English. JSON only.",
    });
    out
}
