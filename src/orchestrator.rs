//! Generation orchestrator
//!
//! Composes throttle, cache, provider, schema, fallback and repetition guard
//! into a single operation that always answers with a valid [`Level`].
//!
//! ## Usage
//!
//! ```no_run
//! use minigame_orchestrator::{GenerateRequest, GenerationOrchestrator, GeminiProvider};
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let mut builder = GenerationOrchestrator::builder();
//! if let Ok(provider) = GeminiProvider::from_env() {
//!     builder = builder.provider(Arc::new(provider));
//! }
//! let orchestrator = builder.build();
//!
//! let level = orchestrator
//!     .handle("203.0.113.7", &GenerateRequest::default())
//!     .await;
//! println!("{}", level.kind());
//! # }
//! ```

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::ForgeConfig;
use crate::fallback::{self, FallbackGenerator};
use crate::guards::{
    MemoryCache, MemoryRepetitionGuard, MemoryThrottle, RepetitionGuard, RequestThrottle,
    ResponseCache,
};
use crate::level::{Level, Persona};
use crate::metrics::{self, Outcome};
use crate::params::{GenerateRequest, PartitionKey, RequestParameters, SpeakerMode};
use crate::prompt::build_prompt;
use crate::provider::LevelProvider;
use crate::schema;
use crate::ForgeError;

/// `_note` attached when no provider is configured.
pub const NOTE_MISSING_KEY: &str = "Missing GEMINI_API_KEY, fallback used.";

/// `_note` attached when the provider failed or produced unusable output.
pub const NOTE_PROVIDER_UNUSABLE: &str = "Provider output unusable, fallback used.";

/// The request pipeline. Cheap to share behind an `Arc`.
pub struct GenerationOrchestrator {
    throttle: Arc<dyn RequestThrottle>,
    cache: Arc<dyn ResponseCache>,
    repetition: Arc<dyn RepetitionGuard>,
    provider: Option<Arc<dyn LevelProvider>>,
    fallback: Arc<FallbackGenerator>,
    provider_timeout: Duration,
    redraw_attempts: usize,
}

impl GenerationOrchestrator {
    /// Builder with in-memory stores and default limits.
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// `true` when a content provider is wired in.
    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Answer a generate request. Never fails.
    ///
    /// Errors and panics inside the pipeline are logged and converted into a
    /// fallback level carrying the message in `_error`.
    pub async fn handle(&self, client_id: &str, request: &GenerateRequest) -> Level {
        let params = RequestParameters::from_request(request);

        let outcome = AssertUnwindSafe(self.try_handle(client_id, &params))
            .catch_unwind()
            .await;

        let message = match outcome {
            Ok(Ok(level)) => return level,
            Ok(Err(e)) => e.to_string(),
            Err(panic) => panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "internal panic".to_string()),
        };

        warn!(client_id = client_id, error = %message, "generation failed, serving fallback");
        metrics::inc_request(Outcome::Error);
        let level = self.fallback.synthesize(params.lang).with_error(message);
        decorate(level, &params)
    }

    /// The fallible pipeline behind [`handle`](Self::handle).
    ///
    /// # Errors
    ///
    /// Propagates store failures. Provider failures never surface here; they
    /// degrade to fallback content.
    pub async fn try_handle(
        &self,
        client_id: &str,
        params: &RequestParameters,
    ) -> Result<Level, ForgeError> {
        if !self.throttle.admit(client_id)? {
            info!(client_id = client_id, "over quota, serving canned joke");
            metrics::inc_request(Outcome::RateLimited);
            return Ok(decorate(fallback::rate_limited(params.lang), params));
        }

        let key = params.partition_key();

        if let Some(entry) = self.cache.get(&key)? {
            debug!(partition = %key, kind = %entry.kind, "serving cached level");
            metrics::inc_request(Outcome::CacheHit);
            return Ok(entry.payload);
        }

        let (level, outcome) = match &self.provider {
            None => (
                self.fallback
                    .synthesize(params.lang)
                    .with_note(NOTE_MISSING_KEY),
                Outcome::Fallback,
            ),
            Some(provider) => {
                let recent = self.repetition.recent(&key)?;
                let prompt = build_prompt(params, &recent);
                match self.generate(provider.as_ref(), &prompt, params).await {
                    Ok(level) => (level, Outcome::Provider),
                    Err(e) => {
                        warn!(partition = %key, error = %e, "provider path failed, using fallback");
                        (
                            self.fallback
                                .synthesize(params.lang)
                                .with_note(NOTE_PROVIDER_UNUSABLE),
                            Outcome::Fallback,
                        )
                    }
                }
            }
        };

        let mut level = decorate(level, params);

        if self.repetition.is_too_recent(&key, level.kind())? {
            level = self.redraw(level, &key, params)?;
        }

        self.cache.put(&key, &level)?;
        self.repetition.record(&key, level.kind())?;

        info!(
            client_id = client_id,
            partition = %key,
            kind = %level.kind(),
            outcome = outcome.as_str(),
            "level served"
        );
        metrics::inc_request(outcome);
        Ok(level)
    }

    /// Provider call, bounded by the timeout, then extraction and validation.
    async fn generate(
        &self,
        provider: &dyn LevelProvider,
        prompt: &str,
        params: &RequestParameters,
    ) -> Result<Level, ForgeError> {
        let started = Instant::now();
        let result = tokio::time::timeout(self.provider_timeout, provider.generate(prompt)).await;
        metrics::record_provider_latency(started.elapsed());

        let text = match result {
            Ok(text) => text?,
            Err(_) => {
                return Err(ForgeError::ProviderTimeout(
                    u64::try_from(self.provider_timeout.as_millis()).unwrap_or(u64::MAX),
                ))
            }
        };

        let candidate = schema::extract_json_object(&text)
            .ok_or_else(|| ForgeError::Provider("no JSON object in provider output".to_string()))?;

        schema::validate(&candidate, params.lang, params.speaker_mode)
            .map_err(|e| ForgeError::Provider(format!("invalid level: {e}")))
    }

    /// Try fallback levels until one is not too recent; keep `chosen` if none is.
    fn redraw(
        &self,
        chosen: Level,
        key: &PartitionKey,
        params: &RequestParameters,
    ) -> Result<Level, ForgeError> {
        for attempt in 1..=self.redraw_attempts {
            metrics::inc_redraw();
            let mut candidate = decorate(self.fallback.synthesize(params.lang), params);
            if !self.repetition.is_too_recent(key, candidate.kind())? {
                debug!(partition = %key, attempt, kind = %candidate.kind(), "redraw accepted");
                candidate.note = chosen.note;
                return Ok(candidate);
            }
        }
        debug!(
            partition = %key,
            kind = %chosen.kind(),
            attempts = self.redraw_attempts,
            "redraw budget exhausted, keeping repeated kind"
        );
        Ok(chosen)
    }
}

/// Duel requests always get persona B as speaker and the canned banter pair.
fn decorate(mut level: Level, params: &RequestParameters) -> Level {
    if params.speaker_mode == SpeakerMode::Duel {
        level.speaker = Persona::Gigetta;
        level.banter = Some(fallback::duel_banter(params.lang));
    }
    level
}

/// Wires a [`GenerationOrchestrator`]; unset parts get in-memory defaults.
pub struct OrchestratorBuilder {
    throttle: Option<Arc<dyn RequestThrottle>>,
    cache: Option<Arc<dyn ResponseCache>>,
    repetition: Option<Arc<dyn RepetitionGuard>>,
    provider: Option<Arc<dyn LevelProvider>>,
    fallback: Option<FallbackGenerator>,
    config: ForgeConfig,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::from_config(&ForgeConfig::default())
    }
}

impl OrchestratorBuilder {
    /// Builder whose default stores and limits come from `config`.
    pub fn from_config(config: &ForgeConfig) -> Self {
        Self {
            throttle: None,
            cache: None,
            repetition: None,
            provider: None,
            fallback: None,
            config: config.clone(),
        }
    }

    /// Use a custom throttle.
    pub fn throttle(mut self, throttle: Arc<dyn RequestThrottle>) -> Self {
        self.throttle = Some(throttle);
        self
    }

    /// Use a custom response cache.
    pub fn cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Use a custom repetition guard.
    pub fn repetition(mut self, repetition: Arc<dyn RepetitionGuard>) -> Self {
        self.repetition = Some(repetition);
        self
    }

    /// Content provider; without one every request takes the fallback path.
    pub fn provider(mut self, provider: Arc<dyn LevelProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Use a specific fallback generator (e.g. a seeded one).
    pub fn fallback(mut self, fallback: FallbackGenerator) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Upper bound on one provider call.
    pub fn provider_timeout(mut self, timeout: Duration) -> Self {
        self.config.provider.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Fallback redraws tried when the chosen kind is too recent.
    pub fn redraw_attempts(mut self, attempts: usize) -> Self {
        self.config.repetition.redraw_attempts = attempts;
        self
    }

    /// Finish wiring.
    pub fn build(self) -> GenerationOrchestrator {
        let config = self.config;
        GenerationOrchestrator {
            throttle: self.throttle.unwrap_or_else(|| {
                Arc::new(MemoryThrottle::new(
                    config.throttle.max_requests,
                    config.throttle.window(),
                ))
            }),
            cache: self
                .cache
                .unwrap_or_else(|| Arc::new(MemoryCache::new(config.cache.ttl()))),
            repetition: self.repetition.unwrap_or_else(|| {
                Arc::new(MemoryRepetitionGuard::new(config.repetition.recent_window))
            }),
            provider: self.provider,
            fallback: Arc::new(self.fallback.unwrap_or_else(|| match config.fallback.seed {
                Some(seed) => FallbackGenerator::seeded(seed),
                None => FallbackGenerator::from_entropy(),
            })),
            provider_timeout: config.provider.timeout(),
            redraw_attempts: config.repetition.redraw_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::{LevelBody, LevelKind};
    use crate::params::Language;
    use crate::provider::ScriptedProvider;

    fn request(lang: &str, speaker_mode: &str) -> GenerateRequest {
        GenerateRequest {
            lang: Some(lang.into()),
            speaker_mode: Some(speaker_mode.into()),
            ..GenerateRequest::default()
        }
    }

    #[tokio::test]
    async fn test_without_provider_serves_annotated_fallback() {
        let orch = GenerationOrchestrator::builder()
            .fallback(FallbackGenerator::seeded(1))
            .build();
        assert!(!orch.has_provider());

        let level = orch.handle("c", &GenerateRequest::default()).await;
        assert_eq!(level.note.as_deref(), Some(NOTE_MISSING_KEY));
        assert!(level.error.is_none());
    }

    #[tokio::test]
    async fn test_valid_provider_output_is_served() {
        let provider = Arc::new(ScriptedProvider::new().respond(
            r#"Sure! {"id": 5, "type": "quiz_tf", "speaker": "gigetto", "q": "Sky is blue?", "answer": true, "joke": "Duh."}"#,
        ));
        let orch = GenerationOrchestrator::builder()
            .provider(provider.clone())
            .build();

        let level = orch.handle("c", &request("en", "auto")).await;
        assert_eq!(level.id, 5);
        assert_eq!(
            level.body,
            LevelBody::QuizTf {
                q: "Sky is blue?".into(),
                answer: true
            }
        );
        assert!(level.note.is_none());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_garbage_provider_output_falls_back() {
        let provider = Arc::new(ScriptedProvider::new().respond("no json here"));
        let orch = GenerationOrchestrator::builder().provider(provider).build();

        let level = orch.handle("c", &GenerateRequest::default()).await;
        assert_eq!(level.note.as_deref(), Some(NOTE_PROVIDER_UNUSABLE));
    }

    #[tokio::test]
    async fn test_slow_provider_times_out_to_fallback() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .respond(r#"{"id":1,"type":"joke_break","text":"late"}"#)
                .with_delay(Duration::from_millis(200)),
        );
        let orch = GenerationOrchestrator::builder()
            .provider(provider)
            .provider_timeout(Duration::from_millis(20))
            .build();

        let level = orch.handle("c", &GenerateRequest::default()).await;
        assert_eq!(level.note.as_deref(), Some(NOTE_PROVIDER_UNUSABLE));
    }

    #[tokio::test]
    async fn test_duel_decoration_applies_to_fallback() {
        let orch = GenerationOrchestrator::builder().build();
        let level = orch.handle("c", &request("it", "duel")).await;

        assert_eq!(level.speaker, Persona::Gigetta);
        assert!(level.has_valid_duel_banter());
        assert_eq!(level.banter, Some(fallback::duel_banter(Language::It)));
    }

    #[tokio::test]
    async fn test_rate_limited_request_gets_canned_joke() {
        let throttle = Arc::new(MemoryThrottle::new(1, Duration::from_secs(60)));
        let orch = GenerationOrchestrator::builder().throttle(throttle).build();

        let _ = orch.handle("c", &request("en", "auto")).await;
        let level = orch.handle("c", &request("en", "auto")).await;
        assert_eq!(level.body, fallback::rate_limited(Language::En).body);
        assert_eq!(level.kind(), LevelKind::JokeBreak);
    }

    #[tokio::test]
    async fn test_zero_redraw_budget_keeps_repeated_kind() {
        let joke = r#"{"id":1,"type":"joke_break","text":"again"}"#;
        let provider = Arc::new(ScriptedProvider::new().respond(joke).respond(joke));
        let orch = GenerationOrchestrator::builder()
            .provider(provider)
            .cache(Arc::new(MemoryCache::new(Duration::ZERO)))
            .redraw_attempts(0)
            .build();

        let first = orch.handle("c", &GenerateRequest::default()).await;
        let second = orch.handle("c", &GenerateRequest::default()).await;
        assert_eq!(first.kind(), LevelKind::JokeBreak);
        assert_eq!(second.kind(), LevelKind::JokeBreak);
    }

    struct BrokenCache;

    impl ResponseCache for BrokenCache {
        fn get(
            &self,
            _key: &PartitionKey,
        ) -> Result<Option<crate::guards::CacheEntry>, ForgeError> {
            Err(ForgeError::Store("cache offline".into()))
        }

        fn put(&self, _key: &PartitionKey, _payload: &Level) -> Result<(), ForgeError> {
            Ok(())
        }
    }

    struct PanickingThrottle;

    impl RequestThrottle for PanickingThrottle {
        fn admit(&self, _client_id: &str) -> Result<bool, ForgeError> {
            panic!("boom")
        }
    }

    #[tokio::test]
    async fn test_panic_in_pipeline_becomes_error_fallback() {
        let orch = GenerationOrchestrator::builder()
            .throttle(Arc::new(PanickingThrottle))
            .build();

        let level = orch.handle("c", &request("en", "duel")).await;
        assert_eq!(level.error.as_deref(), Some("boom"));
        assert!(level.has_valid_duel_banter());

        let json = serde_json::to_value(&level).unwrap();
        assert_eq!(json["_error"], "boom");
        let checked = crate::schema::validate(&json, Language::En, SpeakerMode::Duel).unwrap();
        assert_eq!(checked.body, level.body);
    }

    #[tokio::test]
    async fn test_store_failure_becomes_error_fallback() {
        let orch = GenerationOrchestrator::builder()
            .cache(Arc::new(BrokenCache))
            .build();

        let level = orch.handle("c", &request("en", "duel")).await;
        assert_eq!(level.error.as_deref(), Some("store error: cache offline"));
        assert!(level.has_valid_duel_banter());
    }
}
