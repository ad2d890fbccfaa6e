//! Configuration validation engine.
//!
//! ## Responsibility
//! Validate semantic constraints on a parsed [`ForgeConfig`] that cannot
//! be expressed through the type system alone.
//!
//! ## Guarantees
//! - Validation collects *all* errors before returning (no short-circuit)
//! - Error messages include the field path and the invalid value

use super::ForgeConfig;

/// Errors arising from configuration parsing, validation, or I/O.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parsing failed.
    #[error("Parse error in {file}: {source}")]
    Parse {
        /// Path of the file that failed to parse.
        file: String,
        /// Underlying TOML deserialization error.
        #[source]
        source: toml::de::Error,
    },

    /// One or more semantic validation rules failed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A specific field has an out-of-range value.
    #[error("Field '{field}' has invalid value {value}: {reason}")]
    InvalidField {
        /// Dot-separated field path (e.g., "throttle.window_secs").
        field: String,
        /// String representation of the invalid value.
        value: String,
        /// Human-readable explanation of the constraint.
        reason: String,
    },

    /// File I/O error.
    #[error("IO error reading {file}: {source}")]
    Io {
        /// Path of the file that could not be read.
        file: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

fn at_least_one(errors: &mut Vec<ConfigError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ConfigError::InvalidField {
            field: field.into(),
            value: "0".into(),
            reason: "must be at least 1".into(),
        });
    }
}

/// Validate all semantic constraints on a [`ForgeConfig`].
///
/// # Errors
///
/// Returns every violation found.
pub fn validate(config: &ForgeConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // ── Server ───────────────────────────────────────────────────────
    at_least_one(&mut errors, "server.port", u64::from(config.server.port));
    at_least_one(
        &mut errors,
        "server.max_request_size",
        config.server.max_request_size as u64,
    );
    if config.server.host.trim().is_empty() {
        errors.push(ConfigError::InvalidField {
            field: "server.host".into(),
            value: format!("{:?}", config.server.host),
            reason: "must not be empty".into(),
        });
    }

    // ── Guards ───────────────────────────────────────────────────────
    at_least_one(
        &mut errors,
        "throttle.max_requests",
        config.throttle.max_requests as u64,
    );
    at_least_one(&mut errors, "throttle.window_secs", config.throttle.window_secs);
    at_least_one(
        &mut errors,
        "repetition.recent_window",
        config.repetition.recent_window as u64,
    );

    // ── Provider ─────────────────────────────────────────────────────
    at_least_one(&mut errors, "provider.timeout_ms", config.provider.timeout_ms);
    if config.provider.model.trim().is_empty() {
        errors.push(ConfigError::InvalidField {
            field: "provider.model".into(),
            value: format!("{:?}", config.provider.model),
            reason: "must not be empty".into(),
        });
    }
    if !config.provider.base_url.starts_with("http://")
        && !config.provider.base_url.starts_with("https://")
    {
        errors.push(ConfigError::InvalidField {
            field: "provider.base_url".into(),
            value: config.provider.base_url.clone(),
            reason: "must be an http(s) URL".into(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_names(errors: &[ConfigError]) -> Vec<String> {
        errors
            .iter()
            .filter_map(|e| match e {
                ConfigError::InvalidField { field, .. } => Some(field.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&ForgeConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_limits_all_reported() {
        let mut config = ForgeConfig::default();
        config.throttle.max_requests = 0;
        config.throttle.window_secs = 0;
        config.repetition.recent_window = 0;
        config.server.port = 0;
        config.provider.timeout_ms = 0;

        let errors = validate(&config).unwrap_err();
        let fields = field_names(&errors);
        assert_eq!(errors.len(), 5, "got {fields:?}");
        for field in [
            "throttle.max_requests",
            "throttle.window_secs",
            "repetition.recent_window",
            "server.port",
            "provider.timeout_ms",
        ] {
            assert!(fields.iter().any(|f| f == field), "missing {field}");
        }
    }

    #[test]
    fn test_zero_redraws_and_ttl_are_allowed() {
        let mut config = ForgeConfig::default();
        config.repetition.redraw_attempts = 0;
        config.cache.ttl_ms = 0;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_base_url_must_be_http() {
        let mut config = ForgeConfig::default();
        config.provider.base_url = "ftp://example.com".into();
        let errors = validate(&config).unwrap_err();
        assert_eq!(field_names(&errors), vec!["provider.base_url".to_string()]);
    }

    #[test]
    fn test_error_message_includes_field_and_value() {
        let err = ConfigError::InvalidField {
            field: "throttle.window_secs".into(),
            value: "0".into(),
            reason: "must be at least 1".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("throttle.window_secs"));
        assert!(msg.contains('0'));
    }
}
