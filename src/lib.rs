//! # s3upload
//!
//! Concurrent multi-file uploads with aggregate progress tracking.
//!
//! An [`UploadSupervisor`](services::upload_supervisor::UploadSupervisor) owns
//! one upload session. Every added file gets its own upload actor running on
//! the tokio runtime, and the supervisor folds the actors' progress and
//! outcomes into a single [`SessionSnapshot`](model::snapshot::SessionSnapshot)
//! published to all handles.
//!
//! The library is used by the `s3upload` binary, and the transport seam lets
//! tests drive sessions without any storage service.

#![forbid(unsafe_code)]

pub mod model;
pub mod services;
pub mod settings;
pub mod utils;
