//! # Server Configuration
//!
//! ## Responsibility
//! Parse and validate the TOML file that tunes the generation server:
//! ```text
//! minigame-server --config forge.toml
//! ```
//!
//! ## Guarantees
//! - Every field has a default; an empty document is a valid config
//! - Validated: semantic constraints are checked before a config is accepted
//! - Schema-exportable: JSON Schema output enables IDE autocomplete
//!
//! ## NOT Responsible For
//! - Wiring stores and providers from the config (that belongs to `orchestrator`)
//! - Reading `GEMINI_API_KEY` (that belongs to `provider`)

pub mod loader;
pub mod validation;

pub use loader::{load_from_file, load_from_str};
pub use validation::ConfigError;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ── Default value functions ──────────────────────────────────────────────

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Default request body cap: 64 KiB. Generate bodies are a handful of short strings.
fn default_max_request_size() -> usize {
    64 * 1024
}

/// Default throttle quota: 25 requests per window.
fn default_max_requests() -> usize {
    25
}

/// Default throttle window: 60 seconds.
fn default_window_secs() -> u64 {
    60
}

/// Default cache TTL: 8000ms.
fn default_ttl_ms() -> u64 {
    8000
}

/// Default number of remembered kinds per partition.
fn default_recent_window() -> usize {
    6
}

/// Default redraw budget when a kind repeats.
fn default_redraw_attempts() -> usize {
    4
}

fn default_model() -> String {
    crate::provider::DEFAULT_MODEL.to_string()
}

fn default_base_url() -> String {
    crate::provider::DEFAULT_BASE_URL.to_string()
}

/// Default provider timeout: 8000ms.
fn default_timeout_ms() -> u64 {
    8000
}

// ── Top-level config ─────────────────────────────────────────────────────

/// Root configuration for a generation server.
///
/// # Example
///
/// ```toml
/// [server]
/// port = 8080
///
/// [throttle]
/// max_requests = 10
/// window_secs = 30
///
/// [fallback]
/// seed = 42
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ForgeConfig {
    /// HTTP listener settings.
    pub server: ServerSection,
    /// Per-client admission control.
    pub throttle: ThrottleSection,
    /// Response memoization.
    pub cache: CacheSection,
    /// Anti-repetition tracking.
    pub repetition: RepetitionSection,
    /// Content provider settings.
    pub provider: ProviderSection,
    /// Local fallback synthesis.
    pub fallback: FallbackSection,
}

impl ForgeConfig {
    /// JSON Schema describing the TOML document.
    pub fn json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ForgeConfig)
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ServerSection {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Largest accepted request body in bytes.
    pub max_request_size: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_request_size: default_max_request_size(),
        }
    }
}

/// Per-client admission control.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ThrottleSection {
    /// Requests admitted per client per window.
    pub max_requests: usize,
    /// Window length in seconds.
    pub window_secs: u64,
}

impl ThrottleSection {
    /// Window as a [`Duration`].
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for ThrottleSection {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

/// Response memoization.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct CacheSection {
    /// How long a cached level is replayed, in milliseconds. 0 disables replay.
    pub ttl_ms: u64,
}

impl CacheSection {
    /// TTL as a [`Duration`].
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_ms: default_ttl_ms(),
        }
    }
}

/// Anti-repetition tracking.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct RepetitionSection {
    /// Kinds remembered per partition.
    pub recent_window: usize,
    /// Fallback redraws tried when the chosen kind is too recent.
    pub redraw_attempts: usize,
}

impl Default for RepetitionSection {
    fn default() -> Self {
        Self {
            recent_window: default_recent_window(),
            redraw_attempts: default_redraw_attempts(),
        }
    }
}

/// Content provider settings. The API key is read from the environment.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ProviderSection {
    /// Gemini model name.
    pub model: String,
    /// API base URL.
    pub base_url: String,
    /// Upper bound on one provider call, in milliseconds.
    pub timeout_ms: u64,
}

impl ProviderSection {
    /// Timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Local fallback synthesis.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct FallbackSection {
    /// Fixed RNG seed; `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = ForgeConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.throttle.max_requests, 25);
        assert_eq!(config.throttle.window(), Duration::from_secs(60));
        assert_eq!(config.cache.ttl(), Duration::from_millis(8000));
        assert_eq!(config.repetition.recent_window, 6);
        assert_eq!(config.repetition.redraw_attempts, 4);
        assert_eq!(config.provider.model, "gemini-1.5-flash");
        assert_eq!(config.provider.timeout(), Duration::from_secs(8));
        assert!(config.fallback.seed.is_none());
    }

    #[test]
    fn test_empty_document_is_all_defaults() {
        let config: ForgeConfig = toml::from_str("").unwrap();
        assert_eq!(config, ForgeConfig::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: ForgeConfig = toml::from_str("[throttle]\nmax_requests = 5\n").unwrap();
        assert_eq!(config.throttle.max_requests, 5);
        assert_eq!(config.throttle.window_secs, 60);
    }

    #[test]
    fn test_json_schema_names_sections() {
        let schema = serde_json::to_value(ForgeConfig::json_schema()).unwrap();
        let props = &schema["properties"];
        for section in ["server", "throttle", "cache", "repetition", "provider", "fallback"] {
            assert!(props.get(section).is_some(), "schema missing {section}");
        }
    }
}
