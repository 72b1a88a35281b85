use serde::Deserialize;

/// Error payload shape the service uses for non-success responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayload {
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Extracts candidate error names from a non-success response body.
///
/// The service mirrors the error name in the body, either as a bare JSON
/// string, as a `{code, message}` object, or as plain text. Candidates are
/// returned in preference order; the caller checks each against the fixed
/// mapping table.
pub(crate) fn error_name_candidates(body: &[u8]) -> Vec<String> {
    if body.is_empty() {
        return Vec::new();
    }
    let mut candidates = Vec::new();
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(serde_json::Value::String(name)) => candidates.push(name),
        Ok(value @ serde_json::Value::Object(_)) => {
            if let Ok(payload) = serde_json::from_value::<ErrorPayload>(value) {
                if let Some(serde_json::Value::String(code)) = payload.code {
                    candidates.push(code);
                }
                if let Some(message) = payload.message {
                    candidates.push(message);
                }
            }
        }
        _ => {
            if let Some(token) = bare_token(body) {
                candidates.push(token);
            }
        }
    }
    candidates
}

// A short single-token text body is treated as an error name.
fn bare_token(body: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(body).ok()?.trim();
    if text.is_empty() || text.len() > 64 || text.contains(char::is_whitespace) {
        return None;
    }
    Some(text.to_owned())
}
