//! Errors surfaced by the chat API.
//!
//! - `Request`: rejected on our side before anything was sent
//! - `Response`: the server answered with an explicit error message
//! - `Unknown`: transport failures and unreadable bodies
//! - `AccessDenied`: `access: false` in the response
//! - `Failed`: `success: false` with access granted

use thiserror::Error;

pub const NO_RIGHT_TEXT: &str = "You have no right to do this";
pub const FAILED_TEXT: &str = "Failed. The room or message may no longer exist";
pub const UNKNOWN_TEXT: &str = "Something went wrong, try again later";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Invalid request built by the client
    #[error("invalid request: {0}")]
    Request(String),

    /// Error message returned by the server
    #[error("server error: {0}")]
    Response(String),

    /// Network failure or malformed response
    #[error("request failed: {0}")]
    Unknown(String),

    #[error("access denied")]
    AccessDenied,

    #[error("operation failed")]
    Failed,
}

impl ApiError {
    /// Text shown to the user for this error.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Request(reason) => reason.clone(),
            ApiError::Response(message) if !message.trim().is_empty() => message.clone(),
            ApiError::Response(_) | ApiError::Unknown(_) => UNKNOWN_TEXT.to_string(),
            ApiError::AccessDenied => NO_RIGHT_TEXT.to_string(),
            ApiError::Failed => FAILED_TEXT.to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Unknown(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Unknown(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_messages_by_kind() {
        assert_eq!(ApiError::AccessDenied.user_message(), NO_RIGHT_TEXT);
        assert_eq!(ApiError::Failed.user_message(), FAILED_TEXT);
        assert_eq!(
            ApiError::Response("Room is archived".into()).user_message(),
            "Room is archived"
        );
        assert_eq!(ApiError::Response("  ".into()).user_message(), UNKNOWN_TEXT);
        assert_eq!(ApiError::Unknown("reset".into()).user_message(), UNKNOWN_TEXT);
    }
}
