//! File encoding: [`UploadedFile`] → [`ContentPart`].
//!
//! Dispatch is on the declared media type only; content is never sniffed.
//! Images travel as inline base64 so the model can look at them. Everything
//! else is decoded as UTF-8 text and inlined verbatim, which is what CSV,
//! plain text, JSON and similar formats need.

use crate::error::ExtractError;
use crate::output::ContentPart;
use crate::pipeline::input::{is_image_media_type, strip_data_uri_prefix, UploadedFile};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// An encoded file: its payload part plus the figures the assembler needs.
#[derive(Debug, Clone)]
pub struct EncodedFile {
    pub name: String,
    pub part: ContentPart,
    /// Raw byte count before encoding.
    pub byte_len: usize,
}

/// Read an uploaded file once and encode it as a content part.
///
/// * `image/*` → [`ContentPart::InlineBinary`] with standard base64 data
/// * anything else → [`ContentPart::Text`] with the UTF-8 decoded content
///
/// # Errors
/// [`ExtractError::Read`] when the byte source cannot be fully read.
pub async fn encode_file(file: UploadedFile) -> Result<EncodedFile, ExtractError> {
    let (name, media_type, bytes) = file.into_bytes().await?;
    let byte_len = bytes.len();
    let part = encode_bytes(&media_type, &bytes);
    debug!(
        "Encoded '{}' ({}) {} bytes → {} payload bytes",
        name,
        media_type,
        byte_len,
        part.payload_len()
    );
    Ok(EncodedFile {
        name,
        part,
        byte_len,
    })
}

/// Encode raw bytes according to the declared media type.
pub fn encode_bytes(media_type: &str, bytes: &[u8]) -> ContentPart {
    if is_image_media_type(media_type) {
        let b64 = STANDARD.encode(bytes);
        ContentPart::inline_binary(media_type, strip_data_uri_prefix(&b64))
    } else {
        ContentPart::text(decode_text(bytes))
    }
}

/// Decode bytes as UTF-8 the way a browser's `readAsText` does: a leading
/// byte-order mark is dropped and invalid sequences become U+FFFD.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
