//! Pipeline stages for file-to-table extraction.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ assemble ──▶ llm ──▶ validate ──▶ tabular
//! (files)   (text/b64)  (framing)   (Gemini) (JSON array)  (CSV)
//! ```
//!
//! 1. [`input`]    — describe each file: name, media type, byte source
//! 2. [`encode`]   — read a file once; images → base64, everything else → UTF-8 text
//! 3. [`assemble`] — frame the payloads around the instruction, in input order
//! 4. [`llm`]      — the single model round trip; the only stage with network I/O
//! 5. [`validate`] — insist on a JSON array, map it to records
//! 6. [`tabular`]  — records → CSV, first record's keys as header

pub mod assemble;
pub mod encode;
pub mod input;
pub mod llm;
pub mod tabular;
pub mod validate;
