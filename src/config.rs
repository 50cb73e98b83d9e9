//! Configuration for an extraction request.
//!
//! All behaviour is controlled through [`ExtractionConfig`], built via its
//! [`ExtractionConfigBuilder`]. The config is cheap to clone and can be shared
//! across requests: it holds no per-request state.

use crate::error::ExtractError;
use crate::pipeline::llm::ExtractionModel;
use crate::progress::ProgressCallback;
use std::fmt;
use std::sync::Arc;

/// Default Gemini model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default Gemini REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Primary environment variable holding the API key.
pub const DEFAULT_API_KEY_ENV: &str = "API_KEY";

/// Environment variable consulted when the primary one is unset.
pub const FALLBACK_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Configuration for an extraction request.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_extract::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .model("gemini-2.5-pro")
///     .read_concurrency(8)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Gemini model identifier. Default: `gemini-2.5-flash`.
    pub model: String,

    /// Explicit API key. Takes precedence over the environment.
    pub api_key: Option<String>,

    /// Environment variable read for the API key at call time. Default: `API_KEY`.
    ///
    /// When it is unset or empty, `GEMINI_API_KEY` is tried as well.
    pub api_key_env: String,

    /// Base URL of the `generateContent` API. Overridable for proxies and tests.
    pub base_url: String,

    /// Custom system instruction. If None, uses [`crate::prompts::SYSTEM_INSTRUCTION`].
    pub system_instruction: Option<String>,

    /// Pre-constructed model client. Takes precedence over the Gemini settings above.
    pub model_client: Option<Arc<dyn ExtractionModel>>,

    /// Maximum number of files read concurrently. Default: 4.
    pub read_concurrency: usize,

    /// Per-call model timeout in seconds. Default: none (wait indefinitely).
    pub api_timeout_secs: Option<u64>,

    /// Download timeout in seconds for URL inputs resolved through
    /// [`crate::resolve_input`]. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional progress events receiver.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            system_instruction: None,
            model_client: None,
            read_concurrency: 4,
            api_timeout_secs: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_key_env", &self.api_key_env)
            .field("base_url", &self.base_url)
            .field("system_instruction", &self.system_instruction.is_some())
            .field(
                "model_client",
                &self.model_client.as_ref().map(|_| "<dyn ExtractionModel>"),
            )
            .field("read_concurrency", &self.read_concurrency)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The system instruction actually sent.
    pub fn effective_system_instruction(&self) -> &str {
        self.system_instruction
            .as_deref()
            .unwrap_or(crate::prompts::SYSTEM_INSTRUCTION)
    }

    /// Look up the API key: explicit key, then `api_key_env`, then
    /// `GEMINI_API_KEY`. Empty values count as unset.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
            return Some(key.clone());
        }
        [self.api_key_env.as_str(), FALLBACK_API_KEY_ENV]
            .into_iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|v| !v.trim().is_empty())
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_key_env(mut self, var: impl Into<String>) -> Self {
        self.config.api_key_env = var.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.config.system_instruction = Some(instruction.into());
        self
    }

    pub fn model_client(mut self, client: Arc<dyn ExtractionModel>) -> Self {
        self.config.model_client = Some(client);
        self
    }

    pub fn read_concurrency(mut self, n: usize) -> Self {
        self.config.read_concurrency = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.read_concurrency == 0 {
            return Err(ExtractError::InvalidConfig(
                "Read concurrency must be ≥ 1".into(),
            ));
        }
        if c.model.trim().is_empty() {
            return Err(ExtractError::InvalidConfig("Model name must not be empty".into()));
        }
        if c.api_key_env.trim().is_empty() {
            return Err(ExtractError::InvalidConfig(
                "API key variable name must not be empty".into(),
            ));
        }
        if c.download_timeout_secs == 0 {
            return Err(ExtractError::InvalidConfig(
                "Download timeout must be ≥ 1 second".into(),
            ));
        }
        if c.api_timeout_secs == Some(0) {
            return Err(ExtractError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ExtractionConfig::default();
        assert_eq!(c.model, "gemini-2.5-flash");
        assert_eq!(c.api_key_env, "API_KEY");
        assert_eq!(c.read_concurrency, 4);
        assert!(c.api_timeout_secs.is_none());
        assert_eq!(
            c.effective_system_instruction(),
            crate::prompts::SYSTEM_INSTRUCTION
        );
    }

    #[test]
    fn zero_concurrency_rejected() {
        let err = ExtractionConfig::builder()
            .read_concurrency(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidConfig(_)));
    }

    #[test]
    fn zero_download_timeout_rejected() {
        let err = ExtractionConfig::builder()
            .download_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidConfig(_)));
    }

    #[test]
    fn empty_model_rejected() {
        assert!(ExtractionConfig::builder().model("  ").build().is_err());
    }

    #[test]
    fn explicit_key_wins() {
        let c = ExtractionConfig::builder()
            .api_key("k-123")
            .api_key_env("EDGEQUAKE_EXTRACT_TEST_UNSET_VAR")
            .build()
            .unwrap();
        assert_eq!(c.resolve_api_key().as_deref(), Some("k-123"));
    }

    #[test]
    fn debug_redacts_key() {
        let c = ExtractionConfig::builder().api_key("secret").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn custom_system_instruction() {
        let c = ExtractionConfig::builder()
            .system_instruction("only JSON")
            .build()
            .unwrap();
        assert_eq!(c.effective_system_instruction(), "only JSON");
    }
}
