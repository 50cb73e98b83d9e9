//! System instruction and request framing for the extraction model.
//!
//! Centralising every prompt string here means the framing the model sees can
//! be inspected and unit-tested without a network call.
//!
//! Callers can override the system instruction via
//! [`crate::config::ExtractionConfig::system_instruction`]; the framing
//! helpers are fixed, the rest of the pipeline relies on their exact shape.

/// Fixed system instruction sent with every request.
///
/// The response validator trusts this contract completely: it does not strip
/// markdown fences or skip conversational prefixes.
pub const SYSTEM_INSTRUCTION: &str = "You are an expert data extraction API. \
Your sole purpose is to receive file contents and a user's instruction, and then respond with \
ONLY a valid JSON array of objects representing the extracted data. Do not provide any \
conversational text, explanations, or markdown code fences. Your entire output must be \
parsable as JSON. Each object in the array represents a row of extracted data.";

/// Marker opening a file's payload.
pub const START_OF_FILE: &str = "START OF FILE";

/// Marker closing a file's payload.
pub const END_OF_FILE: &str = "END OF FILE";

/// Leading text part carrying the user's instruction.
pub fn instruction_header(instruction: &str) -> String {
    format!("USER INSTRUCTION: \"{}\"\n\n---", instruction)
}

/// Text part emitted before a file's payload.
pub fn file_start(name: &str) -> String {
    format!("\n{}: {}\n---\n", START_OF_FILE, name)
}

/// Text part emitted after a file's payload.
pub fn file_end(name: &str) -> String {
    format!("\n---\n{}: {}\n", END_OF_FILE, name)
}
