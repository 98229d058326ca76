//! Navigation error types

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NavigationError {
    #[error("Unknown route: {0}")]
    UnknownRoute(String),

    #[error("Route already registered: {0}")]
    DuplicateRoute(String),

    #[error("Invalid guard transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}
