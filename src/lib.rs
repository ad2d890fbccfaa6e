//! # minigame-orchestrator
//!
//! Generates short, single-serving mini-game levels (quizzes, reflex tasks,
//! memory games, jokes) on demand from an LLM, and serves them through a
//! stateless request/response endpoint.
//!
//! ## Architecture
//!
//! ```text
//! Client → Throttle → Cache → Provider → Schema ─┬→ Duel decoration → Repetition guard → Cache/record
//!              │                  │        │     │
//!              └── soft reject    └────────┴─────┴→ FallbackGenerator
//! ```
//!
//! Untrusted model output always goes through [`schema::validate`]. Whenever
//! the provider path cannot produce a valid level, [`FallbackGenerator`]
//! synthesizes one locally, so a request never ends in a hard failure.

// ── Lint policy ───────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(missing_docs)]

use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod fallback;
pub mod guards;
pub mod level;
pub mod metrics;
pub mod orchestrator;
pub mod params;
pub mod prompt;
pub mod provider;
pub mod schema;

#[cfg(feature = "web-api")]
pub mod web_api;

// Re-exports for convenience
pub use fallback::FallbackGenerator;
pub use level::{BanterLine, Level, LevelBody, LevelKind, Persona};
pub use orchestrator::{GenerationOrchestrator, OrchestratorBuilder};
pub use params::{GenerateRequest, Language, PartitionKey, RequestParameters, SpeakerMode};
pub use provider::{GeminiProvider, LevelProvider, ScriptedProvider};

/// Initialise the global tracing subscriber.
///
/// Reads the `LOG_FORMAT` environment variable to choose output format:
/// - `"json"`: structured JSON output for log aggregators
/// - anything else (including unset): human-readable pretty output
///
/// Filter level is controlled by `RUST_LOG` (e.g. `RUST_LOG=info`).
///
/// # Errors
///
/// Returns [`ForgeError::Other`] if the global subscriber has already
/// been set (e.g. by a previous call or a test harness).
///
/// # Panics
///
/// This function never panics.
pub fn init_tracing() -> Result<(), ForgeError> {
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let result = match format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_current_span(true)
            .with_span_list(true)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init(),
    };

    result.map_err(|e| ForgeError::Other(format!("tracing init failed: {e}")))
}

/// Top-level errors.
///
/// None of these ever reach the client of [`GenerationOrchestrator::handle`];
/// they are logged and converted into fallback content.
#[derive(Error, Debug)]
pub enum ForgeError {
    /// The content provider call failed (network, API status, or body parsing).
    #[error("provider failed: {0}")]
    Provider(String),

    /// The content provider did not answer within the configured timeout.
    #[error("provider timed out after {0} ms")]
    ProviderTimeout(u64),

    /// A configuration value is missing or invalid (e.g., missing API key).
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// A state store (throttle, cache, recent kinds) failed.
    #[error("store error: {0}")]
    Store(String),

    /// Catch-all for errors that do not fit a specific variant.
    #[error("{0}")]
    Other(String),
}

/// Milliseconds since the Unix epoch; used as the level identifier.
pub(crate) fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}
