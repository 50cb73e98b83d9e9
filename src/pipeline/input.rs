//! Input resolution: turn caller-supplied files into [`UploadedFile`]s.
//!
//! An [`UploadedFile`] pairs a display name and a declared media type with a
//! byte source that is read exactly once, by the encoder. Reading is deferred
//! so that a request rejected at the caller boundary never touches the disk.
//!
//! Sources:
//! * a local path (read lazily with `tokio::fs`)
//! * bytes already in memory (uploads received by a host application)
//! * a base64 `data:` URI, as produced by browser `FileReader.readAsDataURL`
//! * an HTTP/HTTPS URL, downloaded eagerly into memory by [`resolve_input`]

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Fallback media type when neither the caller nor the file name says more.
pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

static RE_DATA_URI_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^data:(?P<mime>[^;,]*)(?:;[^;,]*)*;base64,").expect("static regex")
});

/// Where an uploaded file's bytes come from.
#[derive(Debug, Clone)]
pub enum FileSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
    /// A complete `data:<mime>;base64,<payload>` URI.
    DataUri(String),
}

/// One file of an extraction batch.
///
/// Consumed by value when read, so each source is read at most once.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    name: String,
    media_type: String,
    source: FileSource,
}

impl UploadedFile {
    /// Build a file from bytes already in memory.
    pub fn from_bytes(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            source: FileSource::Bytes(bytes.into()),
        }
    }

    /// Reference a local file. The name is the path's final component and
    /// the media type is guessed from its extension.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let media_type = guess_media_type(&path.to_string_lossy());
        Self::from_path_with_type(path, media_type)
    }

    /// Reference a local file with an explicit media type.
    pub fn from_path_with_type(path: impl AsRef<Path>, media_type: impl Into<String>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self {
            name,
            media_type: media_type.into(),
            source: FileSource::Path(path.to_path_buf()),
        }
    }

    /// Build a file from a base64 `data:` URI. The media type declared in the
    /// URI is used unless it is empty.
    pub fn from_data_uri(name: impl Into<String>, uri: impl Into<String>) -> Result<Self, ExtractError> {
        let uri = uri.into();
        let caps = RE_DATA_URI_PREFIX
            .captures(&uri)
            .ok_or_else(|| ExtractError::InvalidInput {
                input: truncate_for_display(&uri),
                reason: "not a base64 data URI".into(),
            })?;
        let media_type = match caps.name("mime").map(|m| m.as_str()) {
            Some(m) if !m.is_empty() => m.to_ascii_lowercase(),
            _ => DEFAULT_MEDIA_TYPE.to_string(),
        };
        Ok(Self {
            name: name.into(),
            media_type,
            source: FileSource::DataUri(uri),
        })
    }

    /// Replace the declared media type.
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = media_type.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }

    /// Whether the declared media type is an image type (`image/…`).
    pub fn is_image(&self) -> bool {
        is_image_media_type(&self.media_type)
    }

    /// Read the complete content, consuming the file.
    ///
    /// Returns the name and media type alongside the bytes so the caller can
    /// still label the payload.
    pub async fn into_bytes(self) -> Result<(String, String, Vec<u8>), ExtractError> {
        let bytes = match self.source {
            FileSource::Bytes(b) => b,
            FileSource::Path(ref p) => tokio::fs::read(p).await.map_err(|e| ExtractError::Read {
                name: self.name.clone(),
                source: e,
            })?,
            FileSource::DataUri(ref uri) => {
                STANDARD
                    .decode(strip_data_uri_prefix(uri).trim())
                    .map_err(|e| ExtractError::Read {
                        name: self.name.clone(),
                        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
                    })?
            }
        };
        Ok((self.name, self.media_type, bytes))
    }
}

/// `true` when the media type starts with `image/` (case-insensitive).
pub fn is_image_media_type(media_type: &str) -> bool {
    media_type
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
}

/// Drop a leading `data:<mime>[;params];base64,` prefix, if present.
pub fn strip_data_uri_prefix(s: &str) -> &str {
    match RE_DATA_URI_PREFIX.find(s) {
        Some(m) => &s[m.end()..],
        None => s,
    }
}

/// Guess a media type from a file name or URL path.
pub fn guess_media_type(name: &str) -> String {
    mime_guess::from_path(name)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string())
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Check if the input string is a `data:` URI.
pub fn is_data_uri(input: &str) -> bool {
    input.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("data:"))
}

/// Resolve a CLI-style input string (path, URL or data URI) to an
/// [`UploadedFile`].
///
/// `media_type` overrides whatever would be inferred. URLs are downloaded
/// immediately, bounded by `config.download_timeout_secs`; local paths are
/// only checked here and read later.
pub async fn resolve_input(
    input: &str,
    media_type: Option<&str>,
    config: &ExtractionConfig,
) -> Result<UploadedFile, ExtractError> {
    let file = if is_url(input) {
        download_url(input, config.download_timeout_secs).await?
    } else if is_data_uri(input) {
        UploadedFile::from_data_uri("inline-data", input)?
    } else {
        resolve_local(input)?
    };

    Ok(match media_type {
        Some(mt) => file.with_media_type(mt),
        None => file,
    })
}

/// Resolve a local file path, validating that it exists and is readable.
fn resolve_local(path_str: &str) -> Result<UploadedFile, ExtractError> {
    let path = PathBuf::from(path_str);

    if !path.is_file() {
        return Err(ExtractError::InvalidInput {
            input: path_str.to_string(),
            reason: "file not found".into(),
        });
    }

    if let Err(e) = std::fs::File::open(&path) {
        return Err(ExtractError::InvalidInput {
            input: path_str.to_string(),
            reason: e.to_string(),
        });
    }

    debug!("Resolved local file: {}", path.display());
    Ok(UploadedFile::from_path(path))
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<UploadedFile, ExtractError> {
    info!("Downloading input from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ExtractError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ExtractError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = extract_filename(url);
    let media_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| guess_media_type(&filename));

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} ({} bytes, {})", filename, bytes.len(), media_type);

    Ok(UploadedFile::from_bytes(filename, media_type, bytes.to_vec()))
}

/// Extract a reasonable filename from the URL path.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded".to_string()
}

fn truncate_for_display(s: &str) -> String {
    const MAX: usize = 48;
    match s.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}\u{2026}", &s[..idx]),
        None => s.to_string(),
    }
}
