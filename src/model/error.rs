//! Structured error types for uploads and the session handle

use std::fmt;

/// Errors a transport can report for a single file
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Access denied - insufficient permissions
    AccessDenied(String),
    /// Destination bucket not found
    BucketNotFound(String),
    /// No bucket given with the upload command and none configured
    MissingBucket,
    /// Network or connectivity error
    NetworkError(String),
    /// Invalid credentials
    InvalidCredentials(String),
    /// Reading the local payload failed
    Io(String),
    /// Generic transport error
    Other(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::AccessDenied(msg) => write!(f, "Access denied: {}", msg),
            TransportError::BucketNotFound(msg) => write!(f, "Bucket not found: {}", msg),
            TransportError::MissingBucket => write!(f, "No destination bucket given"),
            TransportError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            TransportError::InvalidCredentials(msg) => write!(f, "Invalid credentials: {}", msg),
            TransportError::Io(msg) => write!(f, "IO error: {}", msg),
            TransportError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

impl TransportError {
    /// Create a TransportError from an error message, attempting to categorize it
    pub fn from_message(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        let msg_lower = msg.to_lowercase();

        if msg_lower.contains("access denied") || msg_lower.contains("accessdenied") {
            TransportError::AccessDenied(msg)
        } else if msg_lower.contains("no such bucket") || msg_lower.contains("nosuchbucket") {
            TransportError::BucketNotFound(msg)
        } else if msg_lower.contains("network")
            || msg_lower.contains("connection")
            || msg_lower.contains("timeout")
            || msg_lower.contains("dispatch failure")
        {
            TransportError::NetworkError(msg)
        } else if msg_lower.contains("credential")
            || msg_lower.contains("signature")
            || msg_lower.contains("unauthorized")
            || msg_lower.contains("invalidaccesskeyid")
        {
            TransportError::InvalidCredentials(msg)
        } else {
            TransportError::Other(msg)
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        TransportError::Io(e.to_string())
    }
}

/// Returned by the session handle once the supervisor loop has ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorGone;

impl fmt::Display for SupervisorGone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "upload supervisor is no longer running")
    }
}

impl std::error::Error for SupervisorGone {}

/// Result type for transport operations
pub type TransportResult<T = ()> = Result<T, TransportError>;
