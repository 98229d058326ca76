//! Failure classification
//!
//! Every failed call ends up as exactly one [`ClassifiedError`] variant:
//! - `Structured`: body carries `{"error": {"code", "message", "details"}}`
//! - `Legacy`: any other response, optionally with `{"detail": "..."}`
//! - `Network`: no response at all (connection failure, timeout)
//!
//! Classification is pure. Notifications and session expiry are applied by
//! the client afterwards.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::notify::Severity;
use crate::transport::{RawResponse, TransportError};

/// Error codes the backend is known to send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    ResourceNotFound,
    PermissionDenied,
    ValidationError,
    DatabaseError,
    ExternalServiceError,
    ConfigurationError,
    RateLimitExceeded,
    DuplicateResource,
    TenantIsolationViolation,
    InternalServerError,
    Other(String),
}

impl ErrorCode {
    pub fn parse(code: &str) -> Self {
        match code {
            "RESOURCE_NOT_FOUND" => ErrorCode::ResourceNotFound,
            "PERMISSION_DENIED" => ErrorCode::PermissionDenied,
            "VALIDATION_ERROR" => ErrorCode::ValidationError,
            "DATABASE_ERROR" => ErrorCode::DatabaseError,
            "EXTERNAL_SERVICE_ERROR" => ErrorCode::ExternalServiceError,
            "CONFIGURATION_ERROR" => ErrorCode::ConfigurationError,
            "RATE_LIMIT_EXCEEDED" => ErrorCode::RateLimitExceeded,
            "DUPLICATE_RESOURCE" => ErrorCode::DuplicateResource,
            "TENANT_ISOLATION_VIOLATION" => ErrorCode::TenantIsolationViolation,
            "INTERNAL_SERVER_ERROR" => ErrorCode::InternalServerError,
            other => ErrorCode::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::ResourceNotFound => "RESOURCE_NOT_FOUND",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::ExternalServiceError => "EXTERNAL_SERVICE_ERROR",
            ErrorCode::ConfigurationError => "CONFIGURATION_ERROR",
            ErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorCode::DuplicateResource => "DUPLICATE_RESOURCE",
            ErrorCode::TenantIsolationViolation => "TENANT_ISOLATION_VIOLATION",
            ErrorCode::InternalServerError => "INTERNAL_SERVER_ERROR",
            ErrorCode::Other(code) => code,
        }
    }

    /// User-facing text for known codes; takes precedence over the server message
    pub fn default_message(&self) -> Option<&'static str> {
        match self {
            ErrorCode::ResourceNotFound => Some("Resource not found"),
            ErrorCode::PermissionDenied => Some("Permission denied"),
            ErrorCode::ValidationError => Some("Validation failed"),
            ErrorCode::DatabaseError => Some("Database operation failed"),
            ErrorCode::ExternalServiceError => Some("External service error"),
            ErrorCode::ConfigurationError => Some("Configuration error"),
            ErrorCode::RateLimitExceeded => Some("Too many requests, please try again later"),
            ErrorCode::DuplicateResource => Some("Resource already exists"),
            ErrorCode::TenantIsolationViolation => Some("Tenant isolation violation"),
            ErrorCode::InternalServerError => Some("Internal server error"),
            ErrorCode::Other(_) => None,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDetail {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub validation_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedError {
    Structured {
        status: u16,
        code: ErrorCode,
        message: String,
        details: Option<FieldDetail>,
    },
    Legacy {
        status: u16,
        detail: Option<String>,
    },
    Network {
        reason: String,
    },
}

/// Classify a failed call. Never fails.
pub fn classify(outcome: Result<&RawResponse, &TransportError>) -> ClassifiedError {
    let response = match outcome {
        Ok(response) => response,
        Err(e) => {
            return ClassifiedError::Network {
                reason: e.to_string(),
            }
        }
    };

    if let Some(Value::Object(error)) = response.body.get("error") {
        let code = error
            .get("code")
            .and_then(Value::as_str)
            .map(ErrorCode::parse)
            .unwrap_or_else(|| ErrorCode::Other(String::new()));
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let details = error
            .get("details")
            .filter(|d| d.is_object())
            .and_then(|d| serde_json::from_value::<FieldDetail>(d.clone()).ok());

        return ClassifiedError::Structured {
            status: response.status,
            code,
            message,
            details,
        };
    }

    let detail = response
        .body
        .get("detail")
        .and_then(Value::as_str)
        .map(str::to_string);

    ClassifiedError::Legacy {
        status: response.status,
        detail,
    }
}

impl ClassifiedError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClassifiedError::Structured { status, .. } | ClassifiedError::Legacy { status, .. } => {
                Some(*status)
            }
            ClassifiedError::Network { .. } => None,
        }
    }

    pub fn code(&self) -> Option<&ErrorCode> {
        match self {
            ClassifiedError::Structured { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// 5xx responses and missing responses
    pub fn is_server_class(&self) -> bool {
        match self.status() {
            Some(status) => status >= 500,
            None => true,
        }
    }

    /// Field named by a validation failure, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            ClassifiedError::Structured {
                code: ErrorCode::ValidationError,
                details: Some(details),
                ..
            } => details.field.as_deref(),
            _ => None,
        }
    }

    pub fn severity(&self) -> Severity {
        if self.is_server_class() {
            Severity::Critical
        } else if self.status() == Some(429) {
            Severity::Warning
        } else {
            Severity::Error
        }
    }

    /// Text shown to the user for this failure
    pub fn user_message(&self) -> String {
        match self {
            ClassifiedError::Structured {
                code,
                message,
                details,
                ..
            } => {
                let base = code
                    .default_message()
                    .map(str::to_string)
                    .or_else(|| Some(message.clone()).filter(|m| !m.is_empty()))
                    .unwrap_or_else(|| "Operation failed".to_string());

                match (code, details) {
                    (
                        ErrorCode::ValidationError,
                        Some(FieldDetail {
                            field: Some(field),
                            validation_message,
                        }),
                    ) => format!(
                        "{}: {}",
                        field,
                        validation_message.as_deref().unwrap_or(&base)
                    ),
                    _ => base,
                }
            }
            ClassifiedError::Legacy { status, detail } => {
                let detail = detail.as_deref().filter(|d| !d.is_empty());
                match status {
                    401 => "Session expired, please sign in again".to_string(),
                    403 => "You do not have permission to perform this action".to_string(),
                    404 => "The requested resource does not exist".to_string(),
                    422 => detail.unwrap_or("Validation failed").to_string(),
                    429 => "Too many requests, please try again later".to_string(),
                    500 => "Internal server error, please try again later".to_string(),
                    503 => "Service temporarily unavailable, please try again later".to_string(),
                    s if *s > 500 => detail.unwrap_or("Server error").to_string(),
                    _ => detail.unwrap_or("Request failed").to_string(),
                }
            }
            ClassifiedError::Network { .. } => {
                "Unable to reach the server, check your network connection".to_string()
            }
        }
    }
}
