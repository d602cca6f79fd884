//! This module provides the upload actors, their supervisor and the transports
//! that move bytes to the storage service

pub mod s3_transport;
pub mod task_registry;
pub mod transport;
pub mod upload_actor;
pub mod upload_supervisor;
