//! Caller-facing extraction entry points.
//!
//! [`extract`] runs the whole pipeline for one request and is the boundary
//! where requests are validated: a blank instruction or an empty file list is
//! rejected here, before any file is read and before the credential is looked
//! up. The pipeline stages themselves do no such checking.
//!
//! There is no partial success. Either a non-empty dataset comes back or the
//! request fails with one [`ExtractError`].

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::output::{ExtractionOutput, ExtractionStats};
use crate::pipeline::assemble::assemble_request;
use crate::pipeline::input::UploadedFile;
use crate::pipeline::llm::{ExtractionModel, GeminiClient};
use crate::pipeline::validate;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract tabular data from a batch of files.
///
/// # Arguments
/// * `files` — the batch, in the order the model should see it
/// * `instruction` — what to extract, in natural language
/// * `config` — model, credential and concurrency settings
///
/// # Errors
/// * [`ExtractError::Validation`] — blank instruction or no files
/// * [`ExtractError::Authentication`] — no API key configured
/// * [`ExtractError::Read`] — a file could not be read
/// * [`ExtractError::Transport`] — the model call failed
/// * [`ExtractError::MalformedResponse`] — the reply is not a JSON array
/// * [`ExtractError::EmptyResult`] — the reply is an empty array
///
/// # Example
/// ```rust,no_run
/// use edgequake_extract::{extract, ExtractionConfig, UploadedFile};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let files = vec![
///     UploadedFile::from_path("invoices.csv"),
///     UploadedFile::from_path("receipt.jpg"),
/// ];
/// let output = extract(files, "One row per invoice: vendor, date, total", &ExtractionConfig::default()).await?;
/// println!("{}", output.to_csv().unwrap_or_default());
/// # Ok(())
/// # }
/// ```
pub async fn extract(
    files: Vec<UploadedFile>,
    instruction: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let instruction = instruction.as_ref();
    validate_request(files.len(), instruction)?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_start(files.len());
    }

    let result = run_pipeline(files, instruction, config).await;

    if let Some(ref cb) = config.progress_callback {
        match &result {
            Ok(output) => cb.on_extraction_complete(output.dataset.len()),
            Err(e) => cb.on_extraction_error(&e.to_string()),
        }
    }
    if let Err(ref e) = result {
        warn!("Extraction failed ({}): {}", e.kind(), e);
    }

    result
}

/// Extract and serialise straight to CSV text.
pub async fn extract_to_csv(
    files: Vec<UploadedFile>,
    instruction: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<String, ExtractError> {
    let output = extract(files, instruction, config).await?;
    output.to_csv().ok_or(ExtractError::EmptyResult)
}

/// Extract and write the CSV to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn extract_to_file(
    files: Vec<UploadedFile>,
    instruction: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionStats, ExtractError> {
    let output = extract(files, instruction, config).await?;
    let csv = output.to_csv().ok_or(ExtractError::EmptyResult)?;
    let path = output_path.as_ref();
    write_csv_file(path, &csv).await?;

    info!("Wrote {} records to {}", output.stats.records, path.display());
    Ok(output.stats)
}

/// Write CSV text to `path`, creating parent directories.
///
/// The text goes to a sibling `.csv.tmp` file first and is renamed into
/// place, so a failed write never leaves a half-written CSV at `path`.
pub async fn write_csv_file(path: impl AsRef<Path>, csv: &str) -> Result<(), ExtractError> {
    let path = path.as_ref();
    let write_err = |source| ExtractError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("csv.tmp");
    tokio::fs::write(&tmp_path, csv.as_bytes())
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally; do not call from inside an
/// async context.
pub fn extract_sync(
    files: Vec<UploadedFile>,
    instruction: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(files, instruction, config))
}

/// Reject requests that must never reach the pipeline.
///
/// Takes a file count rather than the files so callers can check a request
/// before resolving (and possibly downloading) its inputs.
pub fn validate_request(file_count: usize, instruction: &str) -> Result<(), ExtractError> {
    match (file_count == 0, instruction.trim().is_empty()) {
        (true, true) => Err(ExtractError::Validation(
            "upload at least one file and write an instruction".into(),
        )),
        (true, false) => Err(ExtractError::Validation("upload at least one file".into())),
        (false, true) => Err(ExtractError::Validation("write an instruction".into())),
        (false, false) => Ok(()),
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run_pipeline(
    files: Vec<UploadedFile>,
    instruction: &str,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let total_start = Instant::now();
    info!("Starting extraction: {} files", files.len());

    // ── Step 1: Model + credential (no network yet) ──────────────────────
    let model = resolve_model(config)?;

    // ── Step 2: Read, encode and frame the files ─────────────────────────
    let read_start = Instant::now();
    let request = assemble_request(
        instruction,
        files,
        config.read_concurrency,
        config.progress_callback.as_ref(),
    )
    .await?;
    let read_duration_ms = read_start.elapsed().as_millis() as u64;
    debug!(
        "Read {} files ({} bytes) in {}ms",
        request.files, request.input_bytes, read_duration_ms
    );

    // ── Step 3: Single model round trip ──────────────────────────────────
    if let Some(ref cb) = config.progress_callback {
        cb.on_request_sent(request.parts.len());
    }
    let model_start = Instant::now();
    let reply = model
        .generate(config.effective_system_instruction(), &request.parts)
        .await?;
    let model_duration_ms = model_start.elapsed().as_millis() as u64;
    info!("{} replied in {}ms", model.name(), model_duration_ms);

    // ── Step 4: Validate ─────────────────────────────────────────────────
    let dataset = validate::parse_response(&reply.text)?;
    if dataset.is_empty() {
        return Err(ExtractError::EmptyResult);
    }

    let stats = ExtractionStats {
        files: request.files,
        input_bytes: request.input_bytes,
        content_parts: request.parts.len(),
        records: dataset.len(),
        input_tokens: reply.input_tokens,
        output_tokens: reply.output_tokens,
        read_duration_ms,
        model_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Extraction complete: {} records from {} files, {}ms total",
        stats.records, stats.files, stats.total_duration_ms
    );

    Ok(ExtractionOutput { dataset, stats })
}

/// Use the injected model client if there is one, otherwise build a Gemini
/// client, which reads the API key now.
fn resolve_model(config: &ExtractionConfig) -> Result<Arc<dyn ExtractionModel>, ExtractError> {
    if let Some(ref client) = config.model_client {
        return Ok(Arc::clone(client));
    }
    Ok(Arc::new(GeminiClient::from_config(config)?))
}
