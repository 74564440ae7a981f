use std::time::Duration;
use thiserror::Error;

/// Errors raised while talking to the chat backend
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Failed to create HTTP client: {0}")]
    Client(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),
    #[error("Invalid response: {0}")]
    Validation(String),
    #[error("Malformed stream event: {0}")]
    Parse(String),
}

impl ApiError {
    /// Connection, status and timeout failures; these are worth retrying
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ApiError::Network(_) | ApiError::Status { .. } | ApiError::Timeout(_)
        )
    }

    /// Text shown in the transcript and the error banner
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(_) | ApiError::Client(_) => {
                "Could not reach the recommendation server. Please check your connection and try again.".to_string()
            }
            ApiError::Status { status, .. } if *status >= 500 => {
                format!("The recommendation server had a problem (HTTP {status}). Please try again.")
            }
            ApiError::Status { status, .. } => {
                format!("The request was refused (HTTP {status}).")
            }
            ApiError::Timeout(secs) => {
                format!("No answer within {secs} seconds. Please try again.")
            }
            ApiError::Validation(_) | ApiError::Parse(_) => {
                "The server sent an answer that could not be read.".to_string()
            }
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ApiError::Timeout(timeout.as_secs())
        } else if err.is_decode() {
            ApiError::Validation(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        assert!(ApiError::Network("refused".into()).is_transport());
        assert!(ApiError::Status { status: 502, body: String::new() }.is_transport());
        assert!(ApiError::Timeout(60).is_transport());
        assert!(!ApiError::Validation("missing field".into()).is_transport());
        assert!(!ApiError::Parse("eof".into()).is_transport());
    }

    #[test]
    fn test_user_message_mentions_status() {
        let err = ApiError::Status { status: 503, body: "busy".into() };
        assert!(err.user_message().contains("503"));
        assert!(ApiError::Timeout(60).user_message().contains("60"));
    }
}
