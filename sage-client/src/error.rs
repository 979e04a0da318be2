//! Error types for session operations.

use thiserror::Error;

/// Error from a session operation.
///
/// The three variants map to the three ways a send can fail: the credential
/// could not be (re)acquired, the service answered with a non-success status,
/// or the request never completed at the transport level. Only the last two
/// trigger history rollback; a credential failure happens before any history
/// mutation.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Login was rejected or the credential service could not be reached.
    #[error("credential acquisition failed: {details}")]
    CredentialAcquisition {
        /// HTTP status of the rejection, if the server answered at all
        status: Option<u16>,
        details: String,
    },

    /// The chat service answered with a non-success status.
    #[error("chat service error ({status}): {detail}")]
    Upstream { status: u16, detail: String },

    /// The request failed below HTTP (connect, TLS, timeout, malformed body).
    #[error("transport error: {0}")]
    Transport(String),
}

impl ClientError {
    /// Check if this is a credential-acquisition failure.
    pub const fn is_credential(&self) -> bool {
        matches!(self, Self::CredentialAcquisition { .. })
    }

    /// HTTP status carried by this error, if any.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::CredentialAcquisition { status, .. } => *status,
            Self::Upstream { status, .. } => Some(*status),
            Self::Transport(_) => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Extract a human-readable error message from an error response body.
///
/// The service reports errors as `{"detail": "..."}`; anything else falls
/// back to the raw body, or the status line when the body is empty.
pub(crate) fn detail_from_body(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(detail) = value.get("detail").and_then(|d| d.as_str()) {
            return detail.to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {status}")
    } else {
        trimmed.to_string()
    }
}
