//! Lifecycle state of a single upload item
//!
//! Every file added to a session gets its own actor whose state moves through
//! these variants. The supervisor only ever reads them, the owning actor is
//! the single writer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the lifecycle state of one file's upload.
///
/// `Uploaded` and `Error` are terminal for a cycle, `Stopped` means the actor
/// has been destroyed and may be released by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemState {
    /// Waiting for an upload command
    Idle,
    /// Transport is running
    Uploading,
    /// Transport reported success
    Uploaded,
    /// Transport reported a failure with the given message
    Error(String),
    /// Destroyed, waiting to be removed from the session
    Stopped,
}

impl Default for ItemState {
    fn default() -> Self {
        ItemState::Idle
    }
}

impl ItemState {
    pub fn is_idle(&self) -> bool {
        matches!(self, ItemState::Idle)
    }

    pub fn is_uploading(&self) -> bool {
        matches!(self, ItemState::Uploading)
    }

    pub fn is_uploaded(&self) -> bool {
        matches!(self, ItemState::Uploaded)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ItemState::Error(_))
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, ItemState::Stopped)
    }

    /// Returns true if the item finished its cycle (uploaded or failed)
    pub fn is_terminal(&self) -> bool {
        self.is_uploaded() || self.is_error()
    }

    /// Returns the error message if the upload failed
    pub fn error(&self) -> Option<&str> {
        match self {
            ItemState::Error(msg) => Some(msg),
            _ => None,
        }
    }

    /// Short lowercase label used in logs and JSON output
    pub fn label(&self) -> &'static str {
        match self {
            ItemState::Idle => "idle",
            ItemState::Uploading => "uploading",
            ItemState::Uploaded => "uploaded",
            ItemState::Error(_) => "error",
            ItemState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemState::Idle => write!(f, "Idle"),
            ItemState::Uploading => write!(f, "Uploading"),
            ItemState::Uploaded => write!(f, "Uploaded"),
            ItemState::Error(msg) => write!(f, "Error: {}", msg),
            ItemState::Stopped => write!(f, "Stopped"),
        }
    }
}
