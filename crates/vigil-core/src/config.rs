//! Console configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use vigil_api::ClientConfig;
use vigil_session::SessionEndpoints;

use crate::error::CoreError;
use crate::Result;

/// Environment variable overriding [`ClientConfig::base_url`]
pub const API_URL_ENV: &str = "VIGIL_API_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Only route reachable without a token
    pub login: String,
    /// Where denied authenticated users are sent
    pub home: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            home: "/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the session database file
    pub database_path: PathBuf,
    pub api: ClientConfig,
    pub endpoints: SessionEndpoints,
    pub routes: RouteConfig,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            database_path: data_dir.join("vigil.db"),
            api: ClientConfig::default(),
            endpoints: SessionEndpoints::default(),
            routes: RouteConfig::default(),
        }
    }

    /// Read a JSON config file; missing fields take their defaults.
    /// `VIGIL_API_URL` wins over the file's `api.base_url`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&raw)?;
        config.apply_overrides(std::env::var(API_URL_ENV).ok());
        config.validate()?;

        tracing::info!(path = %path.display(), base_url = %config.api.base_url, "Loaded config");
        Ok(config)
    }

    /// Pipeline config with the login redirect taken from `routes`
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            login_route: self.routes.login.clone(),
            ..self.api.clone()
        }
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("Vigil"))
            .unwrap_or_else(|| PathBuf::from(".vigil"))
    }

    fn apply_overrides(&mut self, api_url: Option<String>) {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api.base_url = url.trim().to_string();
        }
    }

    fn validate(&self) -> Result<()> {
        if self.api.base_url.is_empty() {
            return Err(CoreError::Config("api.base_url is empty".to_string()));
        }
        if !self.routes.login.starts_with('/') || !self.routes.home.starts_with('/') {
            return Err(CoreError::Config(
                "routes must be absolute paths".to_string(),
            ));
        }
        if self.routes.login == self.routes.home {
            return Err(CoreError::Config(
                "login and home routes must differ".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }
}
