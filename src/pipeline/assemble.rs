//! Request assembly: instruction + files → ordered [`ContentPart`] sequence.
//!
//! ## Layout
//!
//! ```text
//! USER INSTRUCTION: "<instruction>"\n\n---
//! \nSTART OF FILE: <name 1>\n---\n
//! <payload 1>
//! \n---\nEND OF FILE: <name 1>\n
//! …
//! \nSTART OF FILE: <name N>\n---\n
//! <payload N>
//! \n---\nEND OF FILE: <name N>\n
//! ```
//!
//! The model has no file-indexed output structure, so the delimiter pairs in
//! input order are what let it reason per file. Reads may complete in any
//! order; `buffered` yields them back in input order before framing.
//!
//! No validation happens here. An empty instruction or file list assembles
//! into a degenerate request; rejecting those is [`crate::extract`]'s job.

use crate::error::ExtractError;
use crate::output::ContentPart;
use crate::pipeline::encode::{encode_file, EncodedFile};
use crate::pipeline::input::UploadedFile;
use crate::progress::ProgressCallback;
use crate::prompts::{file_end, file_start, instruction_header};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::debug;

/// The assembled request body plus the figures gathered while reading.
#[derive(Debug, Clone)]
pub struct AssembledRequest {
    pub parts: Vec<ContentPart>,
    pub files: usize,
    pub input_bytes: u64,
}

/// Read and encode every file (at most `concurrency` at a time), then frame
/// the payloads around the instruction.
///
/// # Errors
/// The first [`ExtractError::Read`] encountered; no partial request is built.
pub async fn assemble_request(
    instruction: &str,
    files: Vec<UploadedFile>,
    concurrency: usize,
    progress: Option<&ProgressCallback>,
) -> Result<AssembledRequest, ExtractError> {
    let total = files.len();
    let encoded: Vec<EncodedFile> = stream::iter(files.into_iter().enumerate().map(
        |(index, file)| async move {
            let encoded = encode_file(file).await?;
            if let Some(cb) = progress {
                cb.on_file_read(index, total, &encoded.name, encoded.byte_len);
            }
            Ok::<_, ExtractError>(encoded)
        },
    ))
    .buffered(concurrency.max(1))
    .try_collect()
    .await?;

    let input_bytes = encoded.iter().map(|e| e.byte_len as u64).sum();
    let parts = assemble_parts(instruction, encoded);
    debug!("Assembled {} content parts for {} files", parts.len(), total);

    Ok(AssembledRequest {
        parts,
        files: total,
        input_bytes,
    })
}

/// Frame already-encoded files around the instruction, in the given order.
///
/// Produces `3N + 1` parts for N files.
pub fn assemble_parts(
    instruction: &str,
    encoded: impl IntoIterator<Item = EncodedFile>,
) -> Vec<ContentPart> {
    let encoded = encoded.into_iter();
    let mut parts = Vec::with_capacity(1 + 3 * encoded.size_hint().0);
    parts.push(ContentPart::text(instruction_header(instruction)));

    for file in encoded {
        parts.push(ContentPart::text(file_start(&file.name)));
        parts.push(file.part);
        parts.push(ContentPart::text(file_end(&file.name)));
    }

    parts
}
