//! Vigil Session Management
//!
//! - The session is the authoritative in-memory record of the token,
//!   profile, selected tenant and tenant list
//! - Only this crate mutates it, and it is the sole writer of the durable
//!   store
//! - Token and tenant snapshot survive restarts; the profile never does
//!   and is re-fetched
//! - Superusers bypass every permission and tenant-role check

mod error;
mod manager;
mod session;
mod state;

pub use error::SessionError;
pub use manager::{Credentials, SessionEndpoints, SessionManager};
pub use session::{Profile, Session, Tenant, TenantRole};
pub use state::SessionHandle;

pub type Result<T> = std::result::Result<T, SessionError>;
