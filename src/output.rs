//! Data types flowing through the extraction pipeline.
//!
//! * [`ContentPart`] — one unit of the multimodal request body.
//! * [`Scalar`] / [`ExtractionRecord`] / [`ExtractedDataset`] — the model's
//!   validated reply.
//! * [`ExtractionOutput`] / [`ExtractionStats`] — what [`crate::extract`]
//!   hands back to the caller.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Request ──────────────────────────────────────────────────────────────

/// One unit of a multimodal request: literal text, or inline base64 binary
/// with its declared media type.
///
/// The position in the request sequence is the part's only identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        value: String,
    },
    InlineBinary {
        media_type: String,
        /// Standard base64, padded, without a `data:` prefix.
        data: String,
    },
}

impl ContentPart {
    pub fn text(value: impl Into<String>) -> Self {
        ContentPart::Text {
            value: value.into(),
        }
    }

    pub fn inline_binary(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        ContentPart::InlineBinary {
            media_type: media_type.into(),
            data: data.into(),
        }
    }

    /// The text value, if this is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { value } => Some(value),
            ContentPart::InlineBinary { .. } => None,
        }
    }

    /// Size of the payload as sent over the wire.
    pub fn payload_len(&self) -> usize {
        match self {
            ContentPart::Text { value } => value.len(),
            ContentPart::InlineBinary { data, .. } => data.len(),
        }
    }
}

// ── Reply ────────────────────────────────────────────────────────────────

/// A single cell value extracted by the model.
///
/// The model is asked for strings and numbers; the remaining JSON kinds are
/// kept rather than rejected so a sloppy reply still serialises.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    /// An array or object where a scalar was expected.
    Nested(serde_json::Value),
}

impl From<serde_json::Value> for Scalar {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Scalar::Null,
            Value::Bool(b) => Scalar::Bool(b),
            Value::Number(n) => Scalar::Number(n),
            Value::String(s) => Scalar::String(s),
            nested @ (Value::Array(_) | Value::Object(_)) => Scalar::Nested(nested),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Number(n.into())
    }
}

/// Cell rendering: `Null` is the empty string, never the word "null".
impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::String(s) => f.write_str(s),
            Scalar::Nested(v) => write!(f, "{v}"),
        }
    }
}

/// One extracted row: field name → value, in the order the model emitted
/// the fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionRecord(IndexMap<String, Scalar>);

impl ExtractionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Option<Scalar> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.0.get(key)
    }

    /// Field names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Scalar>> FromIterator<(K, V)> for ExtractionRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Ordered sequence of records.
///
/// An empty dataset is a valid parse result but carries no usable data;
/// [`crate::extract`] reports it as [`crate::ExtractError::EmptyResult`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedDataset(Vec<ExtractionRecord>);

impl ExtractedDataset {
    pub fn records(&self) -> &[ExtractionRecord] {
        &self.0
    }

    pub fn into_records(self) -> Vec<ExtractionRecord> {
        self.0
    }

    pub fn first(&self) -> Option<&ExtractionRecord> {
        self.0.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExtractionRecord> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<ExtractionRecord>> for ExtractedDataset {
    fn from(records: Vec<ExtractionRecord>) -> Self {
        Self(records)
    }
}

impl FromIterator<ExtractionRecord> for ExtractedDataset {
    fn from_iter<I: IntoIterator<Item = ExtractionRecord>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ExtractedDataset {
    type Item = &'a ExtractionRecord;
    type IntoIter = std::slice::Iter<'a, ExtractionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ── Caller-facing output ─────────────────────────────────────────────────

/// Result of a successful extraction.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionOutput {
    /// Validated, non-empty dataset.
    pub dataset: ExtractedDataset,
    pub stats: ExtractionStats,
}

impl ExtractionOutput {
    /// Serialise the dataset as CSV.
    ///
    /// Always `Some` for an output produced by [`crate::extract`], which never
    /// returns an empty dataset.
    pub fn to_csv(&self) -> Option<String> {
        crate::pipeline::tabular::to_csv(&self.dataset)
    }
}

/// Timing and size figures for one extraction request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Number of files in the request.
    pub files: usize,
    /// Raw bytes read across all files.
    pub input_bytes: u64,
    /// Content parts sent to the model (framing text included).
    pub content_parts: usize,
    /// Records in the validated reply.
    pub records: usize,
    /// Prompt tokens reported by the provider, when it reports them.
    pub input_tokens: Option<u64>,
    /// Output tokens reported by the provider, when it reports them.
    pub output_tokens: Option<u64>,
    pub read_duration_ms: u64,
    pub model_duration_ms: u64,
    pub total_duration_ms: u64,
}
