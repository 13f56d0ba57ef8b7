//! Error type shared by the API wrappers and the stores.
//!
//! Stores never show an `ApiError` directly; they turn it into a
//! human-readable string with [`ApiError::describe`].

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Network-level failure: DNS, connect, timeout, reset.
    #[error("Network error: {0}")]
    Transport(String),

    /// Non-2xx response. `body` holds the decoded JSON body (or `Null`).
    #[error("Request failed with status code {status}")]
    Rejected { status: u16, body: Value },

    /// The backend answered 2xx but reported `success: false`.
    #[error("{0}")]
    AuthFailed(String),

    #[error("Failed to encode request: {0}")]
    Encode(String),

    /// 2xx response whose body did not match the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Failure reading or writing the saved session file.
#[derive(Debug, Error)]
pub enum SessionFileError {
    #[error("Session file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session file is malformed: {0}")]
    Format(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}

impl ApiError {
    /// Status code for rejected requests.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Best-effort user-facing message.
    ///
    /// Priority: the body's `error` field, then its `message` field, then
    /// this error's own message, then `fallback`. Only non-empty string
    /// fields count.
    pub fn describe(&self, fallback: &str) -> String {
        if let ApiError::Rejected { body, .. } = self {
            for field in ["error", "message"] {
                if let Some(text) = body.get(field).and_then(Value::as_str) {
                    if !text.is_empty() {
                        return text.to_string();
                    }
                }
            }
        }

        let own = self.to_string();
        if own.is_empty() {
            fallback.to_string()
        } else {
            own
        }
    }
}
