//! Session turn types.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Speaker role of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message typed by the user
    User,
    /// Reply from the service
    Assistant,
}

impl Role {
    /// String representation matching the wire format.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One message in a conversation, tagged with its speaker role.
///
/// Turns are immutable once appended; the session only ever removes them
/// (rollback of a failed send, trimming the window).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// ISO-8601 timestamp, recorded at append time
    pub timestamp: String,
}

impl Turn {
    /// Create a user turn stamped with the current time.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    /// Create an assistant turn stamped with the current time.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Snapshot of the session's context state, computed on demand.
///
/// Serializable so a presentation layer can ship it across an IPC/FFI
/// boundary unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextInfo {
    pub session_id: String,
    pub message_count: usize,
    pub has_context: bool,
}
