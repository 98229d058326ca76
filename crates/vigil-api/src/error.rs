//! Request pipeline error taxonomy

use thiserror::Error;

use crate::classify::{ClassifiedError, ErrorCode};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication required: {0}")]
    Auth(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Validation failed: {message}")]
    Validation {
        field: Option<String>,
        message: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Request rejected ({status}): {message}")]
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Unexpected response body: {0}")]
    Decode(String),

    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Auth(_) => Some(401),
            ApiError::Permission(_) => Some(403),
            ApiError::NotFound(_) => Some(404),
            ApiError::Validation { .. } => Some(422),
            ApiError::RateLimit(_) => Some(429),
            ApiError::Server { status, .. } | ApiError::Rejected { status, .. } => Some(*status),
            ApiError::Network(_) | ApiError::Decode(_) | ApiError::InvalidConfig(_) => None,
        }
    }

    /// 401 and 403 both mean the current credential cannot be used here
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::Auth(_) | ApiError::Permission(_))
    }
}

impl From<&ClassifiedError> for ApiError {
    fn from(classified: &ClassifiedError) -> Self {
        let message = classified.user_message();

        let status = match classified {
            ClassifiedError::Network { reason } => return ApiError::Network(reason.clone()),
            ClassifiedError::Structured { status, .. } | ClassifiedError::Legacy { status, .. } => {
                *status
            }
        };

        match status {
            401 => ApiError::Auth(message),
            403 => ApiError::Permission(message),
            404 => ApiError::NotFound(message),
            422 => ApiError::Validation {
                field: classified.field().map(str::to_string),
                message,
            },
            429 => ApiError::RateLimit(message),
            500..=599 => ApiError::Server { status, message },
            _ => match classified.code() {
                Some(ErrorCode::ResourceNotFound) => ApiError::NotFound(message),
                Some(ErrorCode::PermissionDenied) => ApiError::Permission(message),
                Some(ErrorCode::ValidationError) => ApiError::Validation {
                    field: classified.field().map(str::to_string),
                    message,
                },
                Some(ErrorCode::RateLimitExceeded) => ApiError::RateLimit(message),
                code => ApiError::Rejected {
                    status,
                    code: code.map(|c| c.as_str().to_string()),
                    message,
                },
            },
        }
    }
}

impl From<ClassifiedError> for ApiError {
    fn from(classified: ClassifiedError) -> Self {
        ApiError::from(&classified)
    }
}
