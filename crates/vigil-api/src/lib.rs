//! Vigil API Pipeline
//!
//! Every console request flows through [`ApiClient`]:
//! - `build` attaches the bearer token and scopes the request to the
//!   selected tenant
//! - `dispatch` performs the call with a fixed timeout
//! - `classify` turns any failure into a [`ClassifiedError`]
//! - the [`NotificationDispatcher`] maps classified errors to user signals
//!
//! Session state is read through the [`AuthContext`] trait; the pipeline
//! never writes it except to expire a rejected credential.

mod classify;
mod client;
mod config;
mod context;
mod error;
mod notify;
mod request;
mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use classify::{classify, ClassifiedError, ErrorCode, FieldDetail};
pub use client::ApiClient;
pub use config::ClientConfig;
pub use context::AuthContext;
pub use error::ApiError;
pub use notify::{
    BufferedSink, ErrorLog, ErrorRecord, NotificationDispatcher, Severity, Signal, SignalSink,
    TracingSink,
};
pub use request::{ApiRequest, Body, Method};
pub use transport::{HttpTransport, RawResponse, Transport, TransportError};

pub type Result<T> = std::result::Result<T, ApiError>;
