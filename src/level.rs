//! Level data model.
//!
//! A [`Level`] is one served challenge. The variant-specific part lives in
//! [`LevelBody`], an internally tagged enum serialized under `"type"`, so the
//! JSON a client receives looks like:
//!
//! ```json
//! {"id":1718000000000,"speaker":"gigetto","type":"quiz_tf","q":"JavaScript is Java.","answer":false,"joke":"No."}
//! ```
//!
//! Constructing a `Level` by hand does not check variant invariants; only
//! [`crate::schema::validate`] and [`crate::fallback`] are trusted producers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length, in characters, of one banter line.
pub const MAX_BANTER_CHARS: usize = 120;

/// One of the two response voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    /// Persona A: the cynical coach. Default speaker.
    Gigetto,
    /// Persona B: the witty rival. Primary speaker in duel mode.
    Gigetta,
}

impl Persona {
    /// Parse a wire tag; anything other than the two persona names is `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "gigetto" => Some(Self::Gigetto),
            "gigetta" => Some(Self::Gigetta),
            _ => None,
        }
    }

    /// Wire tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gigetto => "gigetto",
            Self::Gigetta => "gigetta",
        }
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self::Gigetto
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminant of a [`Level`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelKind {
    /// Multiple choice, three options.
    QuizMcq,
    /// True or false.
    QuizTf,
    /// Put items in order.
    QuizOrder,
    /// Fill the blank with one word.
    QuizFill,
    /// Mental arithmetic, three options.
    QuizMath,
    /// Hit a moving target.
    ReflexMove,
    /// Pick a button, avoid the bomb.
    AvoidBomb,
    /// Tap N times before time runs out.
    TapSprint,
    /// Find matching card pairs.
    MemoryPair,
    /// A joke, no challenge.
    JokeBreak,
}

impl LevelKind {
    /// Every kind, in prompt order.
    pub const ALL: [LevelKind; 10] = [
        LevelKind::QuizMcq,
        LevelKind::QuizTf,
        LevelKind::QuizOrder,
        LevelKind::QuizFill,
        LevelKind::QuizMath,
        LevelKind::ReflexMove,
        LevelKind::AvoidBomb,
        LevelKind::TapSprint,
        LevelKind::MemoryPair,
        LevelKind::JokeBreak,
    ];

    /// Wire name (`"quiz_mcq"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::QuizMcq => "quiz_mcq",
            Self::QuizTf => "quiz_tf",
            Self::QuizOrder => "quiz_order",
            Self::QuizFill => "quiz_fill",
            Self::QuizMath => "quiz_math",
            Self::ReflexMove => "reflex_move",
            Self::AvoidBomb => "avoid_bomb",
            Self::TapSprint => "tap_sprint",
            Self::MemoryPair => "memory_pair",
            Self::JokeBreak => "joke_break",
        }
    }

    /// Parse a wire name. Unknown names are `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for LevelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variant-specific payload of a [`Level`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LevelBody {
    /// Multiple choice: exactly 3 options, `correct` in `0..3`.
    QuizMcq {
        /// Question text.
        q: String,
        /// The three options.
        options: Vec<String>,
        /// Index of the right option.
        correct: usize,
    },
    /// True or false.
    QuizTf {
        /// Statement to judge.
        q: String,
        /// Whether the statement is true.
        answer: bool,
    },
    /// Ordering: 3..=6 items, `correctOrder` as long as `items`.
    #[serde(rename_all = "camelCase")]
    QuizOrder {
        /// Instruction text.
        q: String,
        /// Items to order.
        items: Vec<String>,
        /// Indices of `items` in the right order.
        correct_order: Vec<usize>,
    },
    /// Fill the blank (`__` in `q`).
    QuizFill {
        /// Sentence with a blank.
        q: String,
        /// The missing word.
        answer: String,
    },
    /// Mental arithmetic. `correct` is always recomputed from `q`.
    QuizMath {
        /// Question containing `a op b`.
        q: String,
        /// The three options.
        options: Vec<String>,
        /// Index of the option equal to the computed result, or 0.
        correct: usize,
    },
    /// Catch a moving target.
    #[serde(rename_all = "camelCase")]
    ReflexMove {
        /// Instruction text.
        q: String,
        /// Emoji for the target.
        target_icon: String,
        /// Time limit, ms, in `2000..=5000`.
        duration: u32,
    },
    /// Pick any button but the bomb.
    #[serde(rename_all = "camelCase")]
    AvoidBomb {
        /// Instruction text.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        q: Option<String>,
        /// Button count, `4..=9`.
        buttons: u32,
        /// Bomb position, `0..buttons`.
        bomb_index: u32,
        /// Time limit, ms, in `2000..=5000`.
        duration: u32,
    },
    /// Tap repeatedly.
    #[serde(rename_all = "camelCase")]
    TapSprint {
        /// Instruction text.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        q: Option<String>,
        /// Taps needed, `6..=25`.
        taps_required: u32,
        /// Time limit, ms, in `2000..=6000`.
        duration: u32,
    },
    /// Memory game: even number of cards in `6..=16`.
    MemoryPair {
        /// Instruction text.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        q: Option<String>,
        /// Card faces, each appearing in pairs.
        cards: Vec<String>,
    },
    /// Just a joke.
    JokeBreak {
        /// The joke.
        text: String,
    },
}

impl LevelBody {
    /// Discriminant of this body.
    pub fn kind(&self) -> LevelKind {
        match self {
            Self::QuizMcq { .. } => LevelKind::QuizMcq,
            Self::QuizTf { .. } => LevelKind::QuizTf,
            Self::QuizOrder { .. } => LevelKind::QuizOrder,
            Self::QuizFill { .. } => LevelKind::QuizFill,
            Self::QuizMath { .. } => LevelKind::QuizMath,
            Self::ReflexMove { .. } => LevelKind::ReflexMove,
            Self::AvoidBomb { .. } => LevelKind::AvoidBomb,
            Self::TapSprint { .. } => LevelKind::TapSprint,
            Self::MemoryPair { .. } => LevelKind::MemoryPair,
            Self::JokeBreak { .. } => LevelKind::JokeBreak,
        }
    }
}

/// One line of duel banter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanterLine {
    /// Who says it.
    pub speaker: Persona,
    /// What they say; non-empty, at most [`MAX_BANTER_CHARS`] characters.
    pub text: String,
}

impl BanterLine {
    /// Build a line.
    pub fn new(speaker: Persona, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
        }
    }

    /// Non-empty (after trimming) and within the length cap.
    pub fn is_well_formed(&self) -> bool {
        !self.text.trim().is_empty() && self.text.chars().count() <= MAX_BANTER_CHARS
    }
}

/// One served challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    /// Time-derived identifier (ms since the Unix epoch).
    pub id: u64,
    /// Primary voice.
    pub speaker: Persona,
    /// Variant payload, flattened next to the common fields.
    #[serde(flatten)]
    pub body: LevelBody,
    /// Short coach remark.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joke: Option<String>,
    /// Duel banter: persona A then persona B.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banter: Option<Vec<BanterLine>>,
    /// Degraded-mode annotation. Not part of the level schema.
    #[serde(rename = "_note", default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Top-level failure message. Not part of the level schema.
    #[serde(rename = "_error", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Level {
    /// New level with a time-derived id and no banter or diagnostics.
    pub fn new(speaker: Persona, body: LevelBody, joke: Option<String>) -> Self {
        Self {
            id: crate::now_millis(),
            speaker,
            body,
            joke,
            banter: None,
            note: None,
            error: None,
        }
    }

    /// Discriminant.
    pub fn kind(&self) -> LevelKind {
        self.body.kind()
    }

    /// Attach a `_note` diagnostic.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Attach an `_error` diagnostic.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// `true` when banter is exactly persona A then persona B, both well formed.
    pub fn has_valid_duel_banter(&self) -> bool {
        match self.banter.as_deref() {
            Some([first, second]) => {
                first.speaker == Persona::Gigetto
                    && second.speaker == Persona::Gigetta
                    && first.is_well_formed()
                    && second.is_well_formed()
            }
            _ => false,
        }
    }
}
