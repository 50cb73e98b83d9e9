//! # edgequake-extract
//!
//! Turn a batch of files plus a natural-language instruction into a CSV table,
//! using Gemini as the extractor.
//!
//! ## Why this crate?
//!
//! Pulling "one row per invoice: vendor, date, total" out of a pile of scanned
//! receipts, CSV exports and plain-text notes normally takes a parser per
//! format. Here every file is handed to a multimodal model in one request
//! (text inline, images as base64) with a strict instruction to answer with a
//! JSON array of flat objects. That array is validated and serialised as CSV.
//!
//! ## Pipeline Overview
//!
//! ```text
//! files + instruction
//!  │
//!  ├─ 1. Input     local path, URL, data URI or in-memory bytes
//!  ├─ 2. Encode    image/* → base64, everything else → UTF-8 text
//!  ├─ 3. Assemble  instruction header, then START/payload/END per file
//!  ├─ 4. LLM       one generateContent call, fixed system instruction
//!  ├─ 5. Validate  reply must be exactly a JSON array
//!  └─ 6. Tabular   first record's keys as header → CSV text
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_extract::{extract, ExtractionConfig, UploadedFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Credential read from API_KEY (or GEMINI_API_KEY)
//!     let config = ExtractionConfig::default();
//!     let files = vec![UploadedFile::from_path("q3-invoices.txt")];
//!     let output = extract(files, "List every invoice with vendor and total", &config).await?;
//!     println!("{}", output.to_csv().unwrap_or_default());
//!     eprintln!("{} records", output.stats.records);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `extract2csv` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-extract = { version = "0.1", default-features = false }
//! ```
//!
//! ## Testing without a network
//!
//! [`ExtractionModel`] is the only seam that talks to the outside world.
//! Inject a stub through [`ExtractionConfigBuilder::model_client`] and the
//! rest of the pipeline runs unchanged.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::ExtractError;
pub use extract::{
    extract, extract_sync, extract_to_csv, extract_to_file, validate_request, write_csv_file,
};
pub use output::{
    ContentPart, ExtractedDataset, ExtractionOutput, ExtractionRecord, ExtractionStats, Scalar,
};
pub use pipeline::input::{resolve_input, FileSource, UploadedFile};
pub use pipeline::llm::{ExtractionModel, GeminiClient, ModelReply};
pub use pipeline::tabular::{parse_csv, to_csv};
pub use pipeline::validate::parse_response;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
