//! Prometheus metrics for the generation pipeline.
//!
//! ## Usage
//!
//! Call [`init_metrics`] once at process startup. The helper functions
//! (`inc_request`, `inc_redraw`, …) are no-ops if `init_metrics` was never
//! called, so the pipeline is always safe to run; observability simply
//! degrades gracefully.
//!
//! ## Metrics Exposed
//!
//! | Name | Type | Labels |
//! |------|------|--------|
//! | `forge_requests_total` | Counter | `outcome` |
//! | `forge_redraws_total` | Counter | |
//! | `forge_provider_duration_seconds` | Histogram | |

use crate::ForgeError;
use prometheus::{
    core::Collector, Counter, CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry,
    TextEncoder,
};
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

/// How a generate request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A validated provider level.
    Provider,
    /// A locally synthesized level (missing provider or unusable output).
    Fallback,
    /// A replayed cache entry.
    CacheHit,
    /// The canned over-quota joke.
    RateLimited,
    /// The top-level error fallback.
    Error,
}

impl Outcome {
    /// Label value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Provider => "provider",
            Self::Fallback => "fallback",
            Self::CacheHit => "cache_hit",
            Self::RateLimited => "rate_limited",
            Self::Error => "error",
        }
    }
}

// ── Internal metrics bundle ────────────────────────────────────────────────

/// All Prometheus metrics, bundled so they can be stored in a single
/// [`OnceLock`] and initialised atomically.
pub struct Metrics {
    /// Prometheus registry that owns all metric descriptors.
    pub registry: Registry,
    /// Requests answered, by outcome.
    pub requests_total: CounterVec,
    /// Fallback redraws attempted to dodge a repeated kind.
    pub redraws_total: Counter,
    /// Provider call latency.
    pub provider_duration: Histogram,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

fn build(prefix: &str) -> Result<Metrics, ForgeError> {
    let init = |e: prometheus::Error| ForgeError::Other(format!("metrics init failed: {e}"));
    let register = |e: prometheus::Error| ForgeError::Other(format!("metrics registration failed: {e}"));

    let registry = Registry::new();

    let requests_total = CounterVec::new(
        Opts::new(
            format!("{prefix}_requests_total"),
            "Generate requests answered, by outcome",
        ),
        &["outcome"],
    )
    .map_err(init)?;
    registry
        .register(Box::new(requests_total.clone()))
        .map_err(register)?;

    let redraws_total = Counter::new(
        format!("{prefix}_redraws_total"),
        "Fallback redraws attempted to avoid a recently served kind",
    )
    .map_err(init)?;
    registry
        .register(Box::new(redraws_total.clone()))
        .map_err(register)?;

    let provider_duration = Histogram::with_opts(HistogramOpts::new(
        format!("{prefix}_provider_duration_seconds"),
        "Content provider call latency",
    ))
    .map_err(init)?;
    registry
        .register(Box::new(provider_duration.clone()))
        .map_err(register)?;

    Ok(Metrics {
        registry,
        requests_total,
        redraws_total,
        provider_duration,
    })
}

// ── Initialisation ─────────────────────────────────────────────────────────

/// Initialise all Prometheus metrics in a private registry.
///
/// Calling it a second time is a no-op (returns `Ok(())`).
///
/// # Errors
///
/// Returns [`ForgeError::Other`] if metric construction or registration fails.
pub fn init_metrics() -> Result<(), ForgeError> {
    if METRICS.get().is_some() {
        return Ok(());
    }
    let metrics = build("forge")?;
    // A racing initialiser builds identical descriptors; first one wins.
    let _ = METRICS.set(metrics);
    Ok(())
}

fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

// ── Public helper functions ────────────────────────────────────────────────

/// Count one answered request.
///
/// No-op if metrics have not been initialised.
pub fn inc_request(outcome: Outcome) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.requests_total.get_metric_with_label_values(&[outcome.as_str()]) {
            c.inc();
        }
    }
}

/// Count one fallback redraw.
///
/// No-op if metrics have not been initialised.
pub fn inc_redraw() {
    if let Some(m) = metrics() {
        m.redraws_total.inc();
    }
}

/// Record a provider call latency.
///
/// No-op if metrics have not been initialised.
pub fn record_provider_latency(d: Duration) {
    if let Some(m) = metrics() {
        m.provider_duration.observe(d.as_secs_f64());
    }
}

/// Gather all registered metrics as raw metric families.
///
/// Returns an empty `Vec` if metrics have not been initialised.
pub fn gather() -> Vec<prometheus::proto::MetricFamily> {
    metrics().map_or_else(Vec::new, |m| m.registry.gather())
}

/// Gather and encode all metrics in the Prometheus text exposition format.
///
/// Returns an empty string if metrics have not been initialised or if
/// encoding fails.
pub fn gather_metrics() -> String {
    let families = gather();
    if families.is_empty() {
        return String::new();
    }
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Snapshot of request counters, keyed by outcome label.
///
/// Empty if metrics have not been initialised.
pub fn requests_by_outcome() -> HashMap<String, u64> {
    let Some(m) = metrics() else {
        return HashMap::new();
    };
    let mut out = HashMap::new();
    for family in m.requests_total.collect() {
        for metric in family.get_metric() {
            let outcome = metric
                .get_label()
                .iter()
                .find(|l| l.get_name() == "outcome")
                .map_or("unknown", |l| l.get_value());
            out.insert(outcome.to_string(), metric.get_counter().get_value() as u64);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_idempotent_second_call_is_noop() {
        let _ = init_metrics();
        assert!(init_metrics().is_ok(), "second call must be a no-op returning Ok");
    }

    #[test]
    fn test_isolated_bundle_counts_outcomes() {
        let m = build("t").expect("test: build metrics");
        for _ in 0..2 {
            m.requests_total
                .get_metric_with_label_values(&[Outcome::CacheHit.as_str()])
                .expect("label ok")
                .inc();
        }

        let families = m.registry.gather();
        let family = families
            .iter()
            .find(|f| f.get_name() == "t_requests_total")
            .expect("family must exist");
        let value = family.get_metric()[0].get_counter().get_value();
        assert!((value - 2.0).abs() < f64::EPSILON, "counter must be 2.0, got {value}");
    }

    #[test]
    fn test_isolated_bundle_records_provider_latency() {
        let m = build("t2").expect("test: build metrics");
        m.provider_duration.observe(0.25);
        let families = m.registry.gather();
        let family = families
            .iter()
            .find(|f| f.get_name() == "t2_provider_duration_seconds")
            .expect("histogram family must be present");
        assert_eq!(family.get_metric()[0].get_histogram().get_sample_count(), 1);
    }

    #[test]
    fn test_helpers_do_not_panic() {
        inc_request(Outcome::Fallback);
        inc_redraw();
        record_provider_latency(Duration::from_millis(5));
        let _ = gather_metrics();
    }

    #[test]
    fn test_gather_metrics_lists_forge_counters_after_init() {
        let _ = init_metrics();
        inc_request(Outcome::RateLimited);
        inc_redraw();
        let text = gather_metrics();
        assert!(text.contains("forge_requests_total"));
        assert!(text.contains("forge_redraws_total"));
        assert!(requests_by_outcome().get("rate_limited").copied().unwrap_or(0) >= 1);
    }

    #[test]
    fn test_outcome_labels() {
        let labels: Vec<&str> = [
            Outcome::Provider,
            Outcome::Fallback,
            Outcome::CacheHit,
            Outcome::RateLimited,
            Outcome::Error,
        ]
        .iter()
        .map(|o| o.as_str())
        .collect();
        assert_eq!(
            labels,
            vec!["provider", "fallback", "cache_hit", "rate_limited", "error"]
        );
    }
}
