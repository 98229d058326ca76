//! Pipeline configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const API_PREFIX: &str = "/api/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server origin, e.g. `http://localhost:8000`
    pub base_url: String,
    /// Fixed per-request timeout; expiry classifies as a network error
    pub timeout_secs: u64,
    /// First path segments that are never tenant-scoped
    pub excluded_prefixes: Vec<String>,
    /// Query/body key carrying the selected tenant id
    pub tenant_key: String,
    /// Redirect target emitted when the server rejects the credential
    pub login_route: String,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Whether `path` falls under one of the excluded prefixes.
    ///
    /// Prefixes are compared against whole leading path segments, so
    /// `/auth/login` is excluded while `/authors` is not.
    pub fn is_excluded(&self, path: &str) -> bool {
        let trimmed = path.trim_start_matches('/');
        let trimmed = trimmed.split(['?', '#']).next().unwrap_or_default();

        self.excluded_prefixes.iter().any(|prefix| {
            let prefix = prefix.trim_matches('/');
            !prefix.is_empty()
                && trimmed.starts_with(prefix)
                && matches!(trimmed.as_bytes().get(prefix.len()), None | Some(b'/'))
        })
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            excluded_prefixes: vec![
                "auth".to_string(),
                "tenant-management".to_string(),
                "user-management".to_string(),
            ],
            tenant_key: "project_id".to_string(),
            login_route: "/login".to_string(),
        }
    }
}
