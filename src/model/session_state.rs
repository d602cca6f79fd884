use serde::{Deserialize, Serialize};
use std::fmt;

/// Overall state of an upload session, derived from its items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Nothing in flight, the reset point of the machine
    #[default]
    Idle,
    /// At least one upload cycle is running
    Uploading,
    /// Every item of the cycle was uploaded
    Uploaded,
    /// The cycle finished with at least one failure, or the session was failed
    Error,
}

impl SessionState {
    /// Returns true for `Uploaded` and `Error`, the states a cycle ends in
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Uploaded | SessionState::Error)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Uploading => write!(f, "uploading"),
            SessionState::Uploaded => write!(f, "uploaded"),
            SessionState::Error => write!(f, "error"),
        }
    }
}
