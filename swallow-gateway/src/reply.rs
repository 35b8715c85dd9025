//! Extraction of assistant text from raw backend replies.

use serde_json::Value;

/// Assistant text substituted when a backend reply has no usable candidate.
pub const SENTINEL_REPLY: &str = "Error: Could not generate a valid response.";

/// Outcome of reading a backend reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Trimmed text of the first candidate
    Text(String),
    /// Missing or empty `choices`, or a first candidate without string `text`
    Malformed,
}

/// Raw text of the first candidate, if the reply has the expected shape.
pub fn first_candidate_text(output: &Value) -> Option<&str> {
    output
        .get("choices")?
        .as_array()?
        .first()?
        .get("text")?
        .as_str()
}

pub fn extract_reply(output: &Value) -> Extraction {
    match first_candidate_text(output) {
        Some(text) => Extraction::Text(text.trim().to_string()),
        None => Extraction::Malformed,
    }
}

/// Assistant content for a reply: the trimmed first candidate, or [`SENTINEL_REPLY`].
pub fn reply_text(output: &Value) -> String {
    match extract_reply(output) {
        Extraction::Text(text) => text,
        Extraction::Malformed => {
            tracing::error!(output = %output, "Unexpected LLM output format");
            SENTINEL_REPLY.to_string()
        }
    }
}
