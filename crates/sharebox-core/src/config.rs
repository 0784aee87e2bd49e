//! Client configuration management.
//!
//! This module handles loading and saving the client configuration: the API
//! base URL, timeouts, where the session is persisted, and the last used
//! username.
//!
//! Configuration is stored at `~/.config/sharebox/config.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::api::ApiError;
use crate::auth::{KeyringTokens, SessionFile, TokenPersistence};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "sharebox";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Development server default
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Upper bound on a token refresh (and the logout notification).
/// A refresh that takes longer is treated as failed and ends the session.
const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 10;

/// Cookie the server's CSRF protection reads back from `X-CSRFToken`
const DEFAULT_CSRF_COOKIE: &str = "csrftoken";

pub const ENV_API_URL: &str = "SHAREBOX_API_URL";
pub const ENV_PERSISTENCE: &str = "SHAREBOX_PERSISTENCE";

/// Where the credential pair survives between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceKind {
    /// `session.json` in the cache directory
    File,
    /// OS keychain
    Keyring,
    /// Memory only; every run starts logged out
    None,
}

impl std::str::FromStr for PersistenceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(PersistenceKind::File),
            "keyring" => Ok(PersistenceKind::Keyring),
            "none" | "memory" => Ok(PersistenceKind::None),
            other => Err(anyhow::anyhow!("Unknown persistence backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub refresh_timeout_secs: u64,
    pub persistence: PersistenceKind,
    pub csrf_cookie_name: Option<String>,
    pub last_username: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            refresh_timeout_secs: DEFAULT_REFRESH_TIMEOUT_SECS,
            persistence: PersistenceKind::File,
            csrf_cookie_name: Some(DEFAULT_CSRF_COOKIE.to_string()),
            last_username: None,
        }
    }
}

impl ClientConfig {
    /// Config pointing at `api_base_url` with everything else defaulted and
    /// nothing persisted.
    pub fn for_url(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            persistence: PersistenceKind::None,
            ..Self::default()
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `SHAREBOX_API_URL` / `SHAREBOX_PERSISTENCE` when set.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(url) = std::env::var(ENV_API_URL) {
            if !url.trim().is_empty() {
                self.api_base_url = url;
            }
        }
        if let Ok(kind) = std::env::var(ENV_PERSISTENCE) {
            self.persistence = kind
                .parse()
                .with_context(|| format!("Invalid {}", ENV_PERSISTENCE))?;
        }
        Ok(self)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// The base URL, normalized to end with `/` so relative paths join under it.
    pub fn base_url(&self) -> Result<Url, ApiError> {
        let mut raw = self.api_base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let url = Url::parse(&raw).map_err(|e| {
            ApiError::Validation(format!("Invalid API base URL '{}': {}", self.api_base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ApiError::Validation(format!(
                "API base URL must be http or https, got '{}'",
                url.scheme()
            )));
        }
        Ok(url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }

    /// Build the configured persistence backend.
    pub fn token_persistence(&self) -> Result<Option<Box<dyn TokenPersistence>>> {
        Ok(match self.persistence {
            PersistenceKind::File => Some(Box::new(SessionFile::new(&self.cache_dir()?))),
            PersistenceKind::Keyring => Some(Box::new(KeyringTokens::new())),
            PersistenceKind::None => None,
        })
    }
}
