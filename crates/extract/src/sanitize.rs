use serde::de::DeserializeOwned;

use crate::error::{PipelineError, Result};

const OPEN_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Remove every code-fence marker the model wrapped its answer in and trim.
///
/// All literal occurrences are stripped, not just the outermost pair, so
/// running this twice gives the same text as running it once.
pub fn strip_fences(raw: &str) -> String {
    raw.replace(OPEN_FENCE, "").replace(FENCE, "").trim().to_string()
}

/// Sanitize and decode model output into a typed record.
pub fn decode<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let cleaned = strip_fences(raw);
    if cleaned.is_empty() {
        return Err(PipelineError::Parse("Model returned an empty response".to_string()));
    }
    Ok(serde_json::from_str(&cleaned)?)
}

/// Sanitize model output and hand back the cleaned text untouched.
///
/// The text must still be a JSON object so the response body can never be
/// anything other than a success envelope.
pub fn forward(raw: &str) -> Result<String> {
    let cleaned = strip_fences(raw);
    let value: serde_json::Value = serde_json::from_str(&cleaned)?;
    if !value.is_object() {
        return Err(PipelineError::Parse(
            "Model output is not a JSON object".to_string(),
        ));
    }
    Ok(cleaned)
}
