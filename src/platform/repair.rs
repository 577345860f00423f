use crate::platform::client::PlatformError;
use serde_json::Value;

/// Decode a tag-aggregated payload, repairing the platform's documented
/// malformation: per-job result objects concatenated without a separating
/// delimiter.
///
/// Contract: try a strict parse first; on failure insert separators at the
/// exact object boundary patterns `}{` and `} {` and parse again, wrapping in
/// an array if the repaired text is still a bare object sequence. Anything
/// else is `MalformedResponse`.
pub fn decode_with_repair(body: &str) -> Result<Value, PlatformError> {
    match serde_json::from_str(body) {
        Ok(value) => Ok(value),
        Err(e) => {
            tracing::debug!(error = %e, "Strict decode failed, attempting boundary repair");
            repair_and_decode(body)
        }
    }
}

fn repair_and_decode(body: &str) -> Result<Value, PlatformError> {
    let repaired = body.replace("}{", "}, {").replace("} {", "}, {");

    if let Ok(value) = serde_json::from_str(&repaired) {
        tracing::warn!("Recovered malformed tag payload by inserting object separators");
        return Ok(value);
    }

    // Concatenated top-level objects repair into a comma-joined sequence that
    // still needs enclosing brackets to form an array.
    let trimmed = repaired.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        if let Ok(value) = serde_json::from_str::<Value>(&format!("[{}]", trimmed)) {
            tracing::warn!("Recovered malformed tag payload as a bracketed object sequence");
            return Ok(value);
        }
    }

    Err(PlatformError::MalformedResponse)
}
