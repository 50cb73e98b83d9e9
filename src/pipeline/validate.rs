//! Response validation: raw reply text → [`ExtractedDataset`].
//!
//! The system instruction tells the model to answer with nothing but a JSON
//! array. This stage holds it to that: no fence stripping, no skipping of
//! "Sure! Here is…" prefixes. A reply that is not exactly a JSON array is a
//! [`ExtractError::MalformedResponse`].
//!
//! Record shapes are not checked. Keys may differ between records and values
//! may be any JSON kind; the tabular stage copes with both.

use crate::error::ExtractError;
use crate::output::{ExtractedDataset, ExtractionRecord, Scalar};
use serde_json::Value;
use tracing::{debug, warn};

/// Parse the model's reply into a dataset.
///
/// An empty array is a valid result here; whether that is usable is the
/// caller's decision.
///
/// # Errors
/// [`ExtractError::MalformedResponse`] when the text is not valid JSON or the
/// top-level value is not an array.
pub fn parse_response(text: &str) -> Result<ExtractedDataset, ExtractError> {
    let value: Value = serde_json::from_str(text).map_err(|e| {
        debug!("Unparsable model reply: {}", crate::pipeline::llm::snippet(text, 500));
        ExtractError::MalformedResponse {
            detail: format!("reply is not valid JSON: {e}"),
        }
    })?;

    let items = match value {
        Value::Array(items) => items,
        other => {
            debug!("Non-array model reply: {}", crate::pipeline::llm::snippet(text, 500));
            return Err(ExtractError::MalformedResponse {
                detail: format!("expected a JSON array of objects, got {}", kind_of(&other)),
            });
        }
    };

    let records: ExtractedDataset = items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| (k, Scalar::from(v)))
                .collect::<ExtractionRecord>(),
            other => {
                warn!(
                    "Record {} is {} rather than an object; treating it as empty",
                    idx,
                    kind_of(&other)
                );
                ExtractionRecord::new()
            }
        })
        .collect();

    debug!("Validated {} records", records.len());
    Ok(records)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
