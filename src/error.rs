use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Failure taxonomy for turn reconstruction and transport.
///
/// Per-event parse failures never appear here: malformed individual events
/// are logged and skipped locally so they cannot abort the surrounding turn.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("api key is required")]
    MissingApiKey,
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("invalid request payload: {0}")]
    InvalidRequestPayload(String),
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {0} {1}")]
    Status(StatusCode, String),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("retry exhausted after max attempts (status: {status:?}, last_error: {last_error:?})")]
    RetryExhausted {
        status: Option<StatusCode>,
        last_error: Option<String>,
    },
    /// Terminal stream failure: an `error` event or a stream that ended
    /// before the turn completed.
    #[error("stream failed: {0}")]
    StreamFailed(String),
    #[error("request was cancelled")]
    Cancelled,
    /// A turn is already started, streaming, or awaiting a decision.
    #[error("a turn is already in flight")]
    Busy,
    /// A decision was submitted without an outstanding interrupt or without
    /// a committed conversation identity.
    #[error("{0}")]
    Precondition(String),
    /// Edited tool arguments did not parse as a JSON object.
    #[error("invalid edited tool arguments: {0}")]
    InvalidDecisionArgs(String),
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayload {
    #[serde(rename = "error")]
    pub value: Option<ErrorPayloadFields>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayloadFields {
    pub message: Option<String>,
}

/// Extract a user-facing message from a non-2xx response body.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(ErrorPayload { value: Some(fields) }) = serde_json::from_str::<ErrorPayload>(body) {
        if let Some(message) = fields.message.filter(|value| !value.trim().is_empty()) {
            return message;
        }
    }

    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::parse_error_message;

    #[test]
    fn parse_error_message_prefers_structured_message() {
        let body = r#"{"error":{"message":"conversation not found"}}"#;
        assert_eq!(
            parse_error_message(StatusCode::NOT_FOUND, body),
            "conversation not found"
        );
    }

    #[test]
    fn parse_error_message_falls_back_to_body_then_reason() {
        assert_eq!(
            parse_error_message(StatusCode::BAD_GATEWAY, "upstream gone"),
            "upstream gone"
        );
        assert_eq!(
            parse_error_message(StatusCode::BAD_GATEWAY, ""),
            "Bad Gateway"
        );
    }
}
