//! Vigil Navigation
//!
//! Every route change runs through the [`NavigationGuard`]:
//! 1. Leaving an edit/create page asks for confirmation
//! 2. Unauthenticated users only reach the login page, authenticated
//!    users never do
//! 3. A missing profile is fetched once before anything else is decided
//! 4. Superuser-only routes turn everyone else back home

mod error;
mod guard;
mod route;
mod state;

pub use error::NavigationError;
pub use guard::{AlwaysProceed, LeaveConfirmation, LeaveDecision, NavigationGuard, Verdict};
pub use route::{Route, RouteDef, RouteMeta, RouteTable};
pub use state::GuardState;

pub type Result<T> = std::result::Result<T, NavigationError>;
