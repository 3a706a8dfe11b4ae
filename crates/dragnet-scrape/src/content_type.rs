use dragnet_core::StepError;
use dragnet_journal::StatusData;

/// Reduces an HTTP content-type header to its bare file type, e.g.
/// `application/xml; charset=utf-8` → `xml`.
pub fn extract_content_type(raw: &str) -> &str {
    let base = raw.split(';').next().unwrap_or(raw);
    base.rsplit('/').next().unwrap_or(base).trim()
}

/// Reads the content type a scrape step recorded for this task.
pub fn response_content_type(status: &StatusData, step: &str) -> Result<String, StepError> {
    let headers = status
        .step_output(step)
        .and_then(|output| output.get("response_headers"))
        .and_then(serde_json::Value::as_object)
        .ok_or_else(|| StepError::Runtime("missing response_headers".to_string()))?;
    let content_type = headers
        .get("content-type")
        .or_else(|| headers.get("Content-Type"))
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| StepError::Runtime("missing Content-Type".to_string()))?;
    Ok(extract_content_type(content_type).to_string())
}
