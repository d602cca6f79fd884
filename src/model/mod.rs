//! This module provides common objects used throughout the entire application

pub mod command;
pub mod error;
pub mod item_state;
pub mod session_state;
pub mod snapshot;
pub mod upload_file;
pub mod upload_session;
