//! Model interaction: send the assembled request, get one text reply back.
//!
//! [`ExtractionModel`] is the seam between the pipeline and the provider.
//! [`GeminiClient`] is the shipped implementation and speaks the Gemini
//! `generateContent` REST API directly:
//!
//! ```text
//! POST {base_url}/models/{model}:generateContent
//! x-goog-api-key: <key>
//!
//! { "systemInstruction": { "parts": [{ "text": … }] },
//!   "contents": [{ "role": "user", "parts": [ {"text": …} | {"inlineData": {…}} ] }] }
//! ```
//!
//! There is deliberately no retry loop here: a failed call surfaces as
//! [`ExtractError::Transport`] straight away.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::output::ContentPart;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One text reply from the model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelReply {
    /// Reply text, trimmed.
    pub text: String,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

impl ModelReply {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// A generative model that takes a system instruction plus ordered content
/// parts and answers with a single text reply.
#[async_trait]
pub trait ExtractionModel: Send + Sync {
    /// Provider/model label for logs.
    fn name(&self) -> &str;

    /// Issue one request. Implementations must not retry.
    async fn generate(
        &self,
        system_instruction: &str,
        parts: &[ContentPart],
    ) -> Result<ModelReply, ExtractError>;
}

// ── Gemini wire format ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

/// Variant order matters for `#[serde(untagged)]`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

impl<'a> From<&'a ContentPart> for Part<'a> {
    fn from(part: &'a ContentPart) -> Self {
        match part {
            ContentPart::Text { value } => Part::Text { text: value },
            ContentPart::InlineBinary { media_type, data } => Part::InlineData {
                inline_data: InlineData {
                    mime_type: media_type,
                    data,
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    status: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────────

/// Gemini `generateContent` client.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    timeout_secs: Option<u64>,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Create a client with an explicit key.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout_secs: Option<u64>,
    ) -> Result<Self, ExtractError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| ExtractError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
            timeout_secs,
        })
    }

    /// Create a client from the config, reading the API key now.
    ///
    /// # Errors
    /// [`ExtractError::Authentication`] when no key is configured. No network
    /// activity happens before this check.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        let api_key = config
            .resolve_api_key()
            .ok_or_else(|| ExtractError::Authentication {
                env_var: config.api_key_env.clone(),
            })?;
        Self::new(
            api_key,
            config.model.clone(),
            config.base_url.clone(),
            config.api_timeout_secs,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl ExtractionModel for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        system_instruction: &str,
        parts: &[ContentPart],
    ) -> Result<ModelReply, ExtractError> {
        let body = build_request(system_instruction, parts);
        let start = Instant::now();
        info!("Sending {} content parts to {}", parts.len(), self.model);

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            let detail = match serde_json::from_str::<ErrorEnvelope>(&text) {
                Ok(env) => match env.error.status {
                    Some(s) => format!("{} ({})", env.error.message, s),
                    None => env.error.message,
                },
                Err(_) => snippet(&text, 200),
            };
            warn!("Gemini returned HTTP {}: {}", status, detail);
            return Err(ExtractError::Transport {
                message: format!("HTTP {}: {}", status.as_u16(), detail),
            });
        }

        let reply = parse_reply(&text)?;
        debug!(
            "Gemini reply: {} chars, {:?} in / {:?} out tokens, {:?}",
            reply.text.len(),
            reply.input_tokens,
            reply.output_tokens,
            start.elapsed()
        );
        Ok(reply)
    }
}

impl GeminiClient {
    fn transport_error(&self, e: reqwest::Error) -> ExtractError {
        let message = match (e.is_timeout(), self.timeout_secs) {
            (true, Some(secs)) => format!("request timed out after {secs}s"),
            _ => e.to_string(),
        };
        ExtractError::Transport { message }
    }
}

/// Build the `generateContent` body; parts keep their order.
fn build_request<'a>(
    system_instruction: &'a str,
    parts: &'a [ContentPart],
) -> GenerateContentRequest<'a> {
    GenerateContentRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part::Text {
                text: system_instruction,
            }],
        },
        contents: vec![Content {
            role: Some("user"),
            parts: parts.iter().map(Part::from).collect(),
        }],
    }
}

/// Pull the reply text out of a successful response body.
///
/// All non-thought text parts of the first candidate are concatenated, then
/// trimmed. A response without any text is a transport-level failure.
fn parse_reply(body: &str) -> Result<ModelReply, ExtractError> {
    let parsed: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| ExtractError::Transport {
            message: format!("unexpected response envelope: {e}"),
        })?;

    let (input_tokens, output_tokens) = parsed
        .usage_metadata
        .map(|u| (u.prompt_token_count, u.candidates_token_count))
        .unwrap_or((None, None));

    let Some(candidate) = parsed.candidates.into_iter().next() else {
        let reason = parsed
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .map(|r| format!("request blocked ({r})"))
            .unwrap_or_else(|| "response contained no candidates".to_string());
        return Err(ExtractError::Transport { message: reason });
    };

    let text: String = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter(|p| !p.thought)
        .filter_map(|p| p.text)
        .collect();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.as_deref().unwrap_or("unknown");
        return Err(ExtractError::Transport {
            message: format!("model returned no text (finish reason: {reason})"),
        });
    }

    Ok(ModelReply {
        text: text.trim().to_string(),
        input_tokens,
        output_tokens,
    })
}

/// First `max` characters of `s`, for error messages.
pub(crate) fn snippet(s: &str, max: usize) -> String {
    let s = s.trim();
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}\u{2026}", &s[..idx]),
        None => s.to_string(),
    }
}
