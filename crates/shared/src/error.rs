use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body returned by the assignment endpoints. Validation failures use
/// `{"error": ..}` while missing records use `{"message": ..}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(alias = "error")]
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Best-effort extraction of a server message from a raw response body.
    pub fn from_body(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown howsolved value '{0}'")]
pub struct UnknownHowSolved(pub String);
