//! Configuration and storage credentials

pub mod config;
pub mod file_credentials;
