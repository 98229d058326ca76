//! Session error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Authentication failed: {0}")]
    Auth(#[source] vigil_api::ApiError),

    #[error("Request failed: {0}")]
    Api(#[from] vigil_api::ApiError),

    #[error("Storage error: {0}")]
    Storage(#[from] vigil_storage::StorageError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Login response did not contain an access token")]
    MissingToken,
}

impl SessionError {
    /// Whether the server rejected the credential (401/403); the caller
    /// should log out
    pub fn is_auth_failure(&self) -> bool {
        match self {
            SessionError::Auth(_) | SessionError::NotAuthenticated => true,
            SessionError::Api(e) => e.is_auth_failure(),
            _ => false,
        }
    }
}
