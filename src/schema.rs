//! Content schema: validation and repair of untrusted level candidates.
//!
//! ## Responsibility
//! Turn an arbitrary JSON value (usually parsed out of free-form model text)
//! into a [`Level`] that satisfies its variant's invariants, or reject it.
//!
//! ## Guarantees
//! - Every accepted level satisfies the per-kind constraints below
//! - `quiz_math.correct` is always recomputed from the question text; the
//!   candidate's own index is never trusted
//! - Re-validating an accepted level yields the same level (diagnostic
//!   `_note`/`_error` fields are not part of the schema and are dropped)
//!
//! | kind | required | normalized |
//! |------|----------|------------|
//! | `quiz_mcq` | `q`, 3 `options`, `correct` in 0..3 | |
//! | `quiz_tf` | `q`, boolean `answer` | |
//! | `quiz_order` | `q`, 3..=6 `items`, `correctOrder` of equal length | |
//! | `quiz_fill` | `q`, non-empty `answer` | |
//! | `quiz_math` | `q`, 3 `options` | `correct` |
//! | `reflex_move` | | `duration`, `targetIcon`, `q` |
//! | `avoid_bomb` | | `buttons`, `bombIndex`, `duration` |
//! | `tap_sprint` | | `tapsRequired`, `duration` |
//! | `memory_pair` | even `cards` count in 6..=16 | |
//! | `joke_break` | non-empty `text` | |

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use thiserror::Error;

use crate::level::{BanterLine, Level, LevelBody, LevelKind, Persona};
use crate::params::{Language, SpeakerMode};

/// Default target emoji for `reflex_move`.
pub const DEFAULT_TARGET_ICON: &str = "🎯";

/// Why a candidate was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The candidate is not a JSON object.
    #[error("candidate is not a JSON object")]
    NotAnObject,

    /// Neither a kind nor an id is present.
    #[error("candidate has neither a kind nor an id")]
    MissingKindAndId,

    /// An id is present but no kind.
    #[error("candidate has no kind")]
    MissingKind,

    /// The kind is not one of the ten known variants.
    #[error("unknown kind '{0}'")]
    UnknownKind(String),

    /// Duel mode requires a well-formed banter pair.
    #[error("duel banter invalid: {0}")]
    Banter(&'static str),

    /// A variant field is missing or malformed.
    #[error("{kind}.{field}: {reason}")]
    Field {
        /// Kind being validated.
        kind: LevelKind,
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Extract the first `{` .. last `}` span of `text` and parse it strictly.
///
/// Returns `None` when no braces are present, they are out of order, or the
/// span is not valid JSON.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let first = text.find('{')?;
    let last = text.rfind('}')?;
    if last < first {
        return None;
    }
    serde_json::from_str(&text[first..=last]).ok()
}

fn expression_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(-?\d+)\s*([+\-])\s*(-?\d+)").ok())
        .as_ref()
}

/// Evaluate the first `a + b` / `a - b` expression found in `q`.
///
/// `None` when there is no expression or the operands overflow.
pub fn evaluate_expression(q: &str) -> Option<i64> {
    let caps = expression_pattern()?.captures(q)?;
    let a: i64 = caps.get(1)?.as_str().parse().ok()?;
    let b: i64 = caps.get(3)?.as_str().parse().ok()?;
    match caps.get(2)?.as_str() {
        "+" => a.checked_add(b),
        _ => a.checked_sub(b),
    }
}

/// Index of the option numerically equal to the result of `q`, or 0.
pub fn math_correct_index(q: &str, options: &[String]) -> usize {
    let Some(answer) = evaluate_expression(q) else {
        return 0;
    };
    options
        .iter()
        .position(|opt| {
            opt.trim()
                .parse::<f64>()
                .map(|n| n == answer as f64)
                .unwrap_or(false)
        })
        .unwrap_or(0)
}

/// Validate and normalize `candidate` into a [`Level`].
///
/// # Errors
///
/// Returns the first [`SchemaError`] found; the caller is expected to fall
/// back to locally synthesized content.
pub fn validate(
    candidate: &Value,
    lang: Language,
    speaker_mode: SpeakerMode,
) -> Result<Level, SchemaError> {
    let obj = candidate.as_object().ok_or(SchemaError::NotAnObject)?;

    let kind_name = obj
        .get("type")
        .or_else(|| obj.get("kind"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());
    let id = obj.get("id").and_then(parse_id);
    if kind_name.is_none() && id.is_none() {
        return Err(SchemaError::MissingKindAndId);
    }

    let speaker = obj
        .get("speaker")
        .and_then(Value::as_str)
        .and_then(Persona::from_tag)
        .unwrap_or_else(|| speaker_mode.default_speaker());

    let banter = if speaker_mode == SpeakerMode::Duel {
        Some(validate_banter(obj.get("banter"))?)
    } else {
        None
    };

    let kind_name = kind_name.ok_or(SchemaError::MissingKind)?;
    let kind = LevelKind::from_name(kind_name)
        .ok_or_else(|| SchemaError::UnknownKind(kind_name.to_string()))?;

    let body = validate_body(kind, obj, lang)?;

    Ok(Level {
        id: id.unwrap_or_else(crate::now_millis),
        speaker,
        body,
        joke: obj
            .get("joke")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        banter,
        note: None,
        error: None,
    })
}

fn validate_banter(raw: Option<&Value>) -> Result<Vec<BanterLine>, SchemaError> {
    let lines = raw
        .and_then(Value::as_array)
        .ok_or(SchemaError::Banter("missing"))?;
    if lines.len() != 2 {
        return Err(SchemaError::Banter("must have exactly two lines"));
    }

    let mut parsed = Vec::with_capacity(2);
    for line in lines {
        let speaker = line
            .get("speaker")
            .and_then(Value::as_str)
            .and_then(Persona::from_tag)
            .ok_or(SchemaError::Banter("unknown speaker"))?;
        let text = line
            .get("text")
            .and_then(Value::as_str)
            .ok_or(SchemaError::Banter("text is not a string"))?;
        let line = BanterLine::new(speaker, text);
        if !line.is_well_formed() {
            return Err(SchemaError::Banter("text empty or too long"));
        }
        parsed.push(line);
    }

    if parsed[0].speaker != Persona::Gigetto || parsed[1].speaker != Persona::Gigetta {
        return Err(SchemaError::Banter("order must be gigetto then gigetta"));
    }
    Ok(parsed)
}

fn validate_body(
    kind: LevelKind,
    obj: &Map<String, Value>,
    lang: Language,
) -> Result<LevelBody, SchemaError> {
    let field = |field: &'static str, reason: &'static str| SchemaError::Field {
        kind,
        field,
        reason,
    };
    let question = || text(obj.get("q")).ok_or_else(|| field("q", "missing or empty"));

    let body = match kind {
        LevelKind::QuizMcq => {
            let q = question()?;
            let options = exactly_three(obj.get("options")).ok_or_else(|| field("options", "need 3 entries"))?;
            let correct = obj
                .get("correct")
                .and_then(integer)
                .filter(|c| (0..3).contains(c))
                .ok_or_else(|| field("correct", "must be 0, 1 or 2"))?;
            LevelBody::QuizMcq {
                q,
                options,
                correct: correct as usize,
            }
        }
        LevelKind::QuizTf => LevelBody::QuizTf {
            q: question()?,
            answer: obj
                .get("answer")
                .and_then(Value::as_bool)
                .ok_or_else(|| field("answer", "must be a boolean"))?,
        },
        LevelKind::QuizOrder => {
            let q = question()?;
            let items = string_list(obj.get("items"))
                .filter(|items| (3..=6).contains(&items.len()))
                .ok_or_else(|| field("items", "need 3 to 6 entries"))?;
            let correct_order = obj
                .get("correctOrder")
                .and_then(Value::as_array)
                .and_then(|order| {
                    order
                        .iter()
                        .map(|v| integer(v).filter(|i| *i >= 0).map(|i| i as usize))
                        .collect::<Option<Vec<_>>>()
                })
                .filter(|order| order.len() == items.len())
                .ok_or_else(|| field("correctOrder", "must list one index per item"))?;
            LevelBody::QuizOrder {
                q,
                items,
                correct_order,
            }
        }
        LevelKind::QuizFill => LevelBody::QuizFill {
            q: question()?,
            answer: text(obj.get("answer")).ok_or_else(|| field("answer", "missing or empty"))?,
        },
        LevelKind::QuizMath => {
            let q = question()?;
            let options = exactly_three(obj.get("options")).ok_or_else(|| field("options", "need 3 entries"))?;
            let correct = math_correct_index(&q, &options);
            LevelBody::QuizMath { q, options, correct }
        }
        LevelKind::ReflexMove => LevelBody::ReflexMove {
            q: text(obj.get("q")).unwrap_or_else(|| {
                lang.pick("PRENDI IL BERSAGLIO!", "CATCH THE TARGET!")
                    .to_string()
            }),
            target_icon: text(obj.get("targetIcon"))
                .unwrap_or_else(|| DEFAULT_TARGET_ICON.to_string()),
            duration: clamped_or_default(obj.get("duration"), 3000, 2000, 5000),
        },
        LevelKind::AvoidBomb => {
            let buttons = clamped_or_default(obj.get("buttons"), 6, 4, 9);
            LevelBody::AvoidBomb {
                q: text(obj.get("q")),
                buttons,
                bomb_index: clamped(obj.get("bombIndex"), 0, 0, buttons - 1),
                duration: clamped_or_default(obj.get("duration"), 3500, 2000, 5000),
            }
        }
        LevelKind::TapSprint => LevelBody::TapSprint {
            q: text(obj.get("q")),
            taps_required: clamped_or_default(obj.get("tapsRequired"), 10, 6, 25),
            duration: clamped_or_default(obj.get("duration"), 3500, 2000, 6000),
        },
        LevelKind::MemoryPair => LevelBody::MemoryPair {
            q: text(obj.get("q")),
            cards: string_list(obj.get("cards"))
                .filter(|cards| cards.len() % 2 == 0 && (6..=16).contains(&cards.len()))
                .ok_or_else(|| field("cards", "need an even count between 6 and 16"))?,
        },
        LevelKind::JokeBreak => LevelBody::JokeBreak {
            text: text(obj.get("text")).ok_or_else(|| field("text", "missing or empty"))?,
        },
    };
    Ok(body)
}

// ── Field helpers ─────────────────────────────────────────────────────────

/// Non-empty string, or a number rendered as a string.
fn text(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Array whose entries are all strings or numbers.
fn string_list(v: Option<&Value>) -> Option<Vec<String>> {
    v?.as_array()?
        .iter()
        .map(|entry| match entry {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect()
}

fn exactly_three(v: Option<&Value>) -> Option<Vec<String>> {
    string_list(v).filter(|list| list.len() == 3)
}

/// Number or numeric string.
fn numeric(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Integral JSON number.
fn integer(v: &Value) -> Option<i64> {
    if let Some(i) = v.as_i64() {
        return Some(i);
    }
    let f = v.as_f64()?;
    (f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

fn parse_id(v: &Value) -> Option<u64> {
    numeric(v)
        .filter(|n| *n > 0.0 && *n < u64::MAX as f64)
        .map(|n| n.round() as u64)
}

/// Round and clamp to `[lo, hi]`; non-numeric input takes `default`.
fn clamped(v: Option<&Value>, default: u32, lo: u32, hi: u32) -> u32 {
    let n = v.and_then(numeric).unwrap_or(f64::from(default));
    n.round().clamp(f64::from(lo), f64::from(hi)) as u32
}

/// Like [`clamped`], but a literal `0` also counts as unset.
fn clamped_or_default(v: Option<&Value>, default: u32, lo: u32, hi: u32) -> u32 {
    let v = v.filter(|v| v.as_f64() != Some(0.0));
    clamped(v, default, lo, hi)
}
