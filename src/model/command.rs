//! Messages exchanged between the caller, the supervisor and its actors
use crate::model::error::TransportError;
use crate::model::upload_file::{FileBatch, ItemId};
use crate::settings::file_credentials::FileCredential;

/// Sequence number of an upload cycle; bumped on every accepted upload command
pub type Cycle = u64;

/// Commands the caller can send to an upload session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Add {
        files: FileBatch,
    },
    Upload {
        bucket_id: Option<String>,
        credential: Option<FileCredential>,
    },
    Cancel,
    Clear,
    RemoveStopped,
    RemoveFile {
        item: ItemId,
    },
    /// Session-level failure, ends the running cycle immediately
    Fail {
        reason: String,
    },
}

/// Commands broadcast by the supervisor to each actor's inbox
#[derive(Debug, Clone, PartialEq)]
pub enum ItemCommand {
    Upload {
        cycle: Cycle,
        bucket_id: Option<String>,
        credential: Option<FileCredential>,
    },
    Cancel,
    Destroy,
}

/// Events an actor forwards to its supervisor
#[derive(Debug, Clone, PartialEq)]
pub enum ItemEvent {
    Progress {
        item: ItemId,
        cycle: Cycle,
        additions: u64,
    },
    Done {
        item: ItemId,
        cycle: Cycle,
    },
    Failed {
        item: ItemId,
        cycle: Cycle,
        error: TransportError,
    },
    Stopped {
        item: ItemId,
    },
    /// The actor published a new state; carries no aggregate information
    StateChanged {
        item: ItemId,
    },
}
