//! Request parameters and partition keys.
//!
//! The wire body is lenient: every field is optional and unknown values fall
//! back to the default, so a malformed request still gets a level.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::level::Persona;

/// Content language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Italian; the default for anything that is not `"en"`.
    #[default]
    It,
    /// English.
    En,
}

impl Language {
    /// `"en"` selects English, everything else Italian.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("en") => Self::En,
            _ => Self::It,
        }
    }

    /// Wire code.
    pub fn code(self) -> &'static str {
        match self {
            Self::It => "it",
            Self::En => "en",
        }
    }

    /// Pick the Italian or English variant of a string.
    pub fn pick<'a>(self, it: &'a str, en: &'a str) -> &'a str {
        match self {
            Self::It => it,
            Self::En => en,
        }
    }
}

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)? } default $default:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Parse a wire value; absent or unknown values give the default.
            pub fn parse(raw: Option<&str>) -> Self {
                match raw {
                    $(Some($wire) => Self::$variant,)+
                    _ => Self::$default,
                }
            }

            /// Wire value.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum! {
    /// How hard the level should be.
    Difficulty {
        /// Simpler content.
        Easy => "easy",
        /// Default.
        Normal => "normal",
        /// Meaner and faster.
        Hard => "hard",
    } default Normal
}

wire_enum! {
    /// Tone of the coach remarks.
    Mood {
        /// Gentle irony.
        Soft => "soft",
        /// Light sarcasm. Default.
        Medium => "medium",
        /// Cynical and challenging, still family friendly.
        Savage => "savage",
    } default Medium
}

wire_enum! {
    /// Content theme.
    Topic {
        /// Balanced mix. Default.
        Mixed => "mixed",
        /// Coding, tech, business.
        Tech => "tech",
        /// Everyday humour.
        General => "general",
        /// Super-safe and simple.
        Kids => "kids",
    } default Mixed
}

wire_enum! {
    /// Which persona speaks.
    SpeakerMode {
        /// Provider decides. Default.
        Auto => "auto",
        /// Always persona A.
        Gigetto => "gigetto",
        /// Always persona B.
        Gigetta => "gigetta",
        /// Both personas exchange a banter pair.
        Duel => "duel",
    } default Auto
}

impl SpeakerMode {
    /// Speaker assigned when a candidate carries none (or an unknown one).
    pub fn default_speaker(self) -> Persona {
        match self {
            Self::Gigetta | Self::Duel => Persona::Gigetta,
            Self::Gigetto | Self::Auto => Persona::Gigetto,
        }
    }
}

/// Raw JSON body of a generate request. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// `"it"` or `"en"`.
    #[serde(default)]
    pub lang: Option<String>,
    /// `easy | normal | hard`.
    #[serde(default)]
    pub difficulty: Option<String>,
    /// `soft | medium | savage`.
    #[serde(default)]
    pub mood: Option<String>,
    /// `mixed | tech | general | kids`.
    #[serde(default)]
    pub topic: Option<String>,
    /// `auto | gigetto | gigetta | duel`.
    #[serde(default)]
    pub speaker_mode: Option<String>,
}

impl GenerateRequest {
    /// Parse a raw body field by field. A field that is missing or not a
    /// string is left unset; a body that is not a JSON object is empty.
    pub fn from_body(body: &[u8]) -> Self {
        let Ok(value) = serde_json::from_slice::<Value>(body) else {
            return Self::default();
        };
        let field = |name: &str| value.get(name).and_then(Value::as_str).map(str::to_string);
        Self {
            lang: field("lang"),
            difficulty: field("difficulty"),
            mood: field("mood"),
            topic: field("topic"),
            speaker_mode: field("speakerMode"),
        }
    }
}

/// Resolved request parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RequestParameters {
    /// Content language.
    pub lang: Language,
    /// Difficulty.
    pub difficulty: Difficulty,
    /// Mood.
    pub mood: Mood,
    /// Topic.
    pub topic: Topic,
    /// Speaker mode.
    pub speaker_mode: SpeakerMode,
}

impl RequestParameters {
    /// Resolve a raw request, applying defaults.
    pub fn from_request(req: &GenerateRequest) -> Self {
        Self {
            lang: Language::parse(req.lang.as_deref()),
            difficulty: Difficulty::parse(req.difficulty.as_deref()),
            mood: Mood::parse(req.mood.as_deref()),
            topic: Topic::parse(req.topic.as_deref()),
            speaker_mode: SpeakerMode::parse(req.speaker_mode.as_deref()),
        }
    }

    /// Partition key scoping cache and repetition state.
    pub fn partition_key(&self) -> PartitionKey {
        PartitionKey(format!(
            "{}:{}:{}:{}:{}",
            self.lang.code(),
            self.difficulty,
            self.mood,
            self.topic,
            self.speaker_mode
        ))
    }
}

/// `lang:difficulty:mood:topic:speakerMode`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey(String);

impl PartitionKey {
    /// Key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
