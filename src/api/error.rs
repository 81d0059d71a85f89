use reqwest::StatusCode;

const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Session expired")]
    Unauthorized,
    #[error("HTTP {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Status {
        status: StatusCode,
        message: Option<String>,
    },
    #[error("Unexpected response code {got} (expected {expected})")]
    UnexpectedCode {
        expected: u16,
        got: u16,
        message: Option<String>,
    },
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self::InvalidPayload(msg.into())
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    /// Text for the error dialog: the server's own message when it sent one.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status { message: Some(m), .. }
            | ApiError::UnexpectedCode { message: Some(m), .. }
                if !m.trim().is_empty() =>
            {
                m.clone()
            }
            ApiError::Unauthorized => "Your session has expired. Please sign in again.".into(),
            ApiError::Transport(_) => "Could not reach the server. Check your connection.".into(),
            _ => GENERIC_FAILURE.into(),
        }
    }
}

impl From<url::ParseError> for ApiError {
    fn from(err: url::ParseError) -> Self {
        ApiError::InvalidUrl(err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_prefers_server_text() {
        let err = ApiError::Status {
            status: StatusCode::BAD_REQUEST,
            message: Some("Message can no longer be edited".into()),
        };
        assert_eq!(err.user_message(), "Message can no longer be edited");
    }

    #[test]
    fn user_message_falls_back_when_server_text_blank() {
        let err = ApiError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: Some("   ".into()),
        };
        assert_eq!(err.user_message(), GENERIC_FAILURE);
        assert_eq!(ApiError::invalid_payload("x").user_message(), GENERIC_FAILURE);
    }

    #[test]
    fn unexpected_code_carries_server_message() {
        let err = ApiError::UnexpectedCode {
            expected: 201,
            got: 400,
            message: Some("Conversation closed".into()),
        };
        assert_eq!(err.user_message(), "Conversation closed");
        assert!(!err.is_unauthorized());
        assert!(ApiError::Unauthorized.is_unauthorized());
    }
}
