//! Byte transport driven by an upload actor
//!
//! A transport moves one file to the storage service. It reports transferred
//! byte deltas through a [`ProgressReporter`] and resolves exactly once, with
//! `Ok(())` on success or a [`TransportError`]. Aborting is done by dropping
//! the returned future; the actor guarantees no event of an aborted transfer
//! reaches the supervisor.

use crate::model::error::TransportResult;
use crate::model::upload_file::{ItemId, UploadFile};
use crate::settings::file_credentials::FileCredential;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

/// Everything a transport needs to send one file
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub item: ItemId,
    pub file: UploadFile,
    /// Destination bucket, the transport's default when absent
    pub bucket_id: Option<String>,
    /// Admin credential overriding the transport's default one
    pub credential: Option<FileCredential>,
}

/// Sink for the byte deltas of a single transfer
#[derive(Clone)]
pub struct ProgressReporter {
    sink: Arc<dyn Fn(u64) + Send + Sync>,
}

impl ProgressReporter {
    pub fn new(sink: impl Fn(u64) + Send + Sync + 'static) -> Self {
        ProgressReporter {
            sink: Arc::new(sink),
        }
    }

    /// Reporter that discards everything
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    /// Report `additions` newly transferred bytes; zero deltas are skipped
    pub fn report(&self, additions: u64) {
        if additions > 0 {
            (self.sink)(additions);
        }
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter").finish_non_exhaustive()
    }
}

/// Performs the byte transfer of one file
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    fn upload(
        &self,
        request: UploadRequest,
        progress: ProgressReporter,
    ) -> BoxFuture<'static, TransportResult>;
}
