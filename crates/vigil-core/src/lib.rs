//! Vigil Core
//!
//! Wires storage, the request pipeline, the session and the navigation
//! guard into a single [`Console`]. Only the session crate writes session
//! state; everything else reads it.

mod config;
mod console;
mod error;

pub use config::{Config, RouteConfig};
pub use console::Console;
pub use error::CoreError;

// Re-export core components
pub use vigil_api::{
    ApiClient, ApiError, ApiRequest, ClassifiedError, ClientConfig, ErrorCode, ErrorRecord,
    Method, NotificationDispatcher, Severity, Signal, SignalSink,
};
pub use vigil_navigation::{
    AlwaysProceed, GuardState, LeaveConfirmation, LeaveDecision, NavigationError,
    NavigationGuard, Route, RouteDef, RouteMeta, RouteTable, Verdict,
};
pub use vigil_session::{
    Credentials, Profile, Session, SessionEndpoints, SessionError, SessionManager, Tenant,
    TenantRole,
};
pub use vigil_storage::{Database, StorageError};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
