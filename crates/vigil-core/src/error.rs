//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] vigil_storage::StorageError),

    #[error("API error: {0}")]
    Api(#[from] vigil_api::ApiError),

    #[error("Session error: {0}")]
    Session(#[from] vigil_session::SessionError),

    #[error("Navigation error: {0}")]
    Navigation(#[from] vigil_navigation::NavigationError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}
