use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Failure of a single backend call.
///
/// `Display` yields the message an operator should see: the backend's own
/// `detail` when it sent one, a generic transport message otherwise.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No usable response (connect failure, timeout, broken body).
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("{}", backend_message(.status, .detail))]
    Backend {
        status: StatusCode,
        detail: Option<String>,
    },

    /// The backend answered successfully but the body had an unexpected shape.
    #[error("unexpected response from {path}: {source}")]
    Decode {
        path: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("invalid request URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Builds a [`ApiError::Backend`] from a failed response body.
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        ApiError::Backend {
            status,
            detail: extract_detail(body),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Backend { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status(),
            _ => None,
        }
    }
}

fn backend_message(status: &StatusCode, detail: &Option<String>) -> String {
    match detail {
        Some(detail) => detail.clone(),
        None => format!("request failed with status {status}"),
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Pulls the `detail` field out of an error body.
///
/// FastAPI sends a plain string for handled errors and a list of
/// `{loc, msg, type}` objects for request validation errors.
pub fn extract_detail(body: &[u8]) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
    match parsed.detail {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.is_empty() => None,
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Array(items) => {
            let msgs: Vec<String> = items
                .iter()
                .map(|item| match item.get("msg").and_then(|m| m.as_str()) {
                    Some(msg) => msg.to_string(),
                    None => item.to_string(),
                })
                .collect();
            if msgs.is_empty() {
                None
            } else {
                Some(msgs.join("; "))
            }
        }
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_string_is_the_message() {
        let err = ApiError::from_response(
            StatusCode::NOT_FOUND,
            br#"{"detail": "Bin_ID not found."}"#,
        );
        assert_eq!(err.to_string(), "Bin_ID not found.");
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_validation_detail_list_is_joined() {
        let body = br#"{"detail": [
            {"loc": ["body", "num_trucks"], "msg": "field required", "type": "value_error.missing"},
            {"loc": ["body", "x"], "msg": "value is not a valid integer", "type": "type_error"}
        ]}"#;
        assert_eq!(
            extract_detail(body).as_deref(),
            Some("field required; value is not a valid integer")
        );
    }

    #[test]
    fn test_non_json_body_falls_back_to_status() {
        let err = ApiError::from_response(StatusCode::BAD_GATEWAY, b"<html>bad gateway</html>");
        assert_eq!(
            err.to_string(),
            "request failed with status 502 Bad Gateway"
        );
    }

    #[test]
    fn test_empty_detail_is_ignored() {
        assert_eq!(extract_detail(br#"{"detail": ""}"#), None);
        assert_eq!(extract_detail(br#"{"detail": null}"#), None);
        assert_eq!(extract_detail(br#"{"message": "x"}"#), None);
    }
}
