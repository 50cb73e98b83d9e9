//! Error types for the edgequake-extract library.
//!
//! Every failure of an extraction request is fatal: there is no partial
//! success mode, so a single [`ExtractError`] enum covers the whole pipeline.
//! Each variant's `Display` output is written to be shown to an end user
//! verbatim, one human-readable message per failure.
//!
//! The variants follow the pipeline stages:
//!
//! * caller boundary — [`ExtractError::Validation`]
//! * input / encoding — [`ExtractError::Read`], [`ExtractError::InvalidInput`],
//!   [`ExtractError::DownloadFailed`], [`ExtractError::DownloadTimeout`]
//! * model call — [`ExtractError::Authentication`], [`ExtractError::Transport`]
//! * response — [`ExtractError::MalformedResponse`], [`ExtractError::EmptyResult`]

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-extract library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Caller boundary ───────────────────────────────────────────────────
    /// The request was rejected before any file was read: the instruction is
    /// blank or no file was supplied.
    #[error("Invalid request: {0}")]
    Validation(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// A file's bytes could not be fully read.
    #[error("Failed to read file '{name}': {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The input string is not a readable file path, URL or data URI.
    #[error("Invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Model errors ──────────────────────────────────────────────────────
    /// No API key is available; raised before any network activity.
    #[error("No API key configured.\nSet the {env_var} environment variable (or GEMINI_API_KEY).")]
    Authentication { env_var: String },

    /// The model call failed (network, quota, request rejected by provider).
    #[error("Model request failed: {message}")]
    Transport { message: String },

    // ── Response errors ───────────────────────────────────────────────────
    /// The model reply is not JSON, or not a JSON array.
    #[error(
        "Could not process the response from the model ({detail}).\n\
Try a more specific instruction or check the files."
    )]
    MalformedResponse { detail: String },

    /// The reply parsed as a JSON array but it holds no records.
    #[error(
        "The model returned no data.\n\
Try a more specific instruction or check the files."
    )]
    EmptyResult,

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the output CSV file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExtractError {
    /// Short machine-friendly name of the error kind, used in logs and
    /// progress events.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractError::Validation(_) => "validation",
            ExtractError::Read { .. } => "read",
            ExtractError::InvalidInput { .. } => "invalid_input",
            ExtractError::DownloadFailed { .. } => "download_failed",
            ExtractError::DownloadTimeout { .. } => "download_timeout",
            ExtractError::Authentication { .. } => "authentication",
            ExtractError::Transport { .. } => "transport",
            ExtractError::MalformedResponse { .. } => "malformed_response",
            ExtractError::EmptyResult => "empty_result",
            ExtractError::OutputWriteFailed { .. } => "output_write_failed",
            ExtractError::InvalidConfig(_) => "invalid_config",
            ExtractError::Internal(_) => "internal",
        }
    }
}
