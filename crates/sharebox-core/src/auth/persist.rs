//! Durable storage for the credential pair.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};

use super::Credential;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Keychain service name
const SERVICE_NAME: &str = "sharebox";

/// Fixed keychain accounts for the two tokens
const ACCESS_KEY: &str = "access";
const REFRESH_KEY: &str = "refresh";

/// Backing storage the credential store synchronizes to.
pub trait TokenPersistence: Send + Sync {
    fn load(&self) -> Result<Option<Credential>>;
    fn save(&self, credential: &Credential) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionRecord {
    access: Option<String>,
    refresh: Option<String>,
    saved_at: DateTime<Utc>,
}

/// Credential pair stored as JSON in the cache directory.
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            path: cache_dir.join(SESSION_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenPersistence for SessionFile {
    fn load(&self) -> Result<Option<Credential>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents =
            std::fs::read_to_string(&self.path).context("Failed to read session file")?;
        let record: SessionRecord =
            serde_json::from_str(&contents).context("Failed to parse session file")?;

        let credential = Credential {
            access: record.access,
            refresh: record.refresh,
        };
        Ok((!credential.is_empty()).then_some(credential))
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let record = SessionRecord {
            access: credential.access.clone(),
            refresh: credential.refresh.clone(),
            saved_at: Utc::now(),
        };
        let contents = serde_json::to_string_pretty(&record)?;
        std::fs::write(&self.path, contents).context("Failed to write session file")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

/// Credential pair stored in the OS keychain under fixed accounts.
pub struct KeyringTokens {
    service: String,
}

impl KeyringTokens {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).context("Failed to create keyring entry")
    }

    fn read(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve token from keychain"),
        }
    }

    fn write(&self, key: &str, value: Option<&str>) -> Result<()> {
        let entry = self.entry(key)?;
        match value {
            Some(value) => entry
                .set_password(value)
                .context("Failed to store token in keychain"),
            None => match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => Err(e).context("Failed to delete token from keychain"),
            },
        }
    }
}

impl Default for KeyringTokens {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenPersistence for KeyringTokens {
    fn load(&self) -> Result<Option<Credential>> {
        let credential = Credential {
            access: self.read(ACCESS_KEY)?,
            refresh: self.read(REFRESH_KEY)?,
        };
        Ok((!credential.is_empty()).then_some(credential))
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        self.write(ACCESS_KEY, credential.access.as_deref())?;
        self.write(REFRESH_KEY, credential.refresh.as_deref())
    }

    fn clear(&self) -> Result<()> {
        self.write(ACCESS_KEY, None)?;
        self.write(REFRESH_KEY, None)
    }
}
