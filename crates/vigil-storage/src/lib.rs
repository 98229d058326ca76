//! Vigil Storage Layer
//!
//! SQLite-backed durable store for the console session. Holds the
//! credential token and the selected tenant snapshot so they survive
//! process restarts. The store has no logic of its own; the session
//! crate is its only writer.

mod database;
mod error;
mod migrations;
mod store;

pub use database::Database;
pub use error::StorageError;
pub use store::{SessionStore, CURRENT_TENANT_KEY, TOKEN_KEY};

pub type Result<T> = std::result::Result<T, StorageError>;
