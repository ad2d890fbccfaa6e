//! Content providers
//!
//! A provider turns a composed prompt into free-form text that *should*
//! contain one level as a JSON object. Output is untrusted; the orchestrator
//! always runs it through [`crate::schema::validate`].
//!
//! - [`GeminiProvider`]: Google Generative Language API
//! - [`ScriptedProvider`]: replays canned responses (tests and demos)
//!
//! ## Environment Variables
//!
//! - `GEMINI_API_KEY`: Required for [`GeminiProvider::from_env`]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::ForgeError;

/// Default Gemini model.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Default Gemini API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Source of raw level text.
///
/// The trait is object-safe so providers can be shared as `Arc<dyn LevelProvider>`.
#[async_trait]
pub trait LevelProvider: Send + Sync {
    /// Generate free-form text for `prompt`.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Provider`] when the call fails or the response
    /// carries no text.
    async fn generate(&self, prompt: &str) -> Result<String, ForgeError>;
}

// ============================================================================
// Gemini
// ============================================================================

/// Gemini `generateContent` client.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl GeminiProvider {
    /// Provider with an explicit API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(8),
        }
    }

    /// Provider keyed from `GEMINI_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::ConfigError`] if the variable is unset or blank.
    pub fn from_env() -> Result<Self, ForgeError> {
        let key = std::env::var("GEMINI_API_KEY").unwrap_or_default();
        if key.trim().is_empty() {
            return Err(ForgeError::ConfigError("GEMINI_API_KEY not set".to_string()));
        }
        Ok(Self::new(key.trim()))
    }

    /// Set model name
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set API base URL (no trailing path)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set HTTP request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Model this provider talks to.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl LevelProvider for GeminiProvider {
    async fn generate(&self, prompt: &str) -> Result<String, ForgeError> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| ForgeError::Provider(format!("Gemini request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ForgeError::Provider(format!(
                "Gemini API error {status}: {error_text}"
            )));
        }

        let api_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ForgeError::Provider(format!("Failed to parse Gemini response: {e}")))?;

        let text = api_response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ForgeError::Provider(
                "Gemini returned no candidate text".to_string(),
            ));
        }

        debug!(model = %self.model, chars = text.len(), "provider responded");
        Ok(text)
    }
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

// ============================================================================
// Scripted
// ============================================================================

/// Replays queued responses in order, then fails.
///
/// ```
/// use minigame_orchestrator::ScriptedProvider;
///
/// let provider = ScriptedProvider::new()
///     .respond(r#"{"type":"joke_break","text":"hi"}"#)
///     .fail("upstream down");
/// assert_eq!(provider.remaining(), 2);
/// ```
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String, ForgeError>>>,
    calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedProvider {
    /// Empty script; every call fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response.
    pub fn respond(self, text: impl Into<String>) -> Self {
        self.script.lock().push_back(Ok(text.into()));
        self
    }

    /// Queue a provider failure.
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.script
            .lock()
            .push_back(Err(ForgeError::Provider(message.into())));
        self
    }

    /// Sleep this long before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of `generate` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

#[async_trait]
impl LevelProvider for ScriptedProvider {
    async fn generate(&self, _prompt: &str) -> Result<String, ForgeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ForgeError::Provider("script exhausted".to_string())))
    }
}
