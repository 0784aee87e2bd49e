use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::persist::TokenPersistence;

/// The access/refresh token pair.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access: Option<String>,
    pub refresh: Option<String>,
}

impl Credential {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: Some(access.into()),
            refresh: Some(refresh.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.access.is_none() && self.refresh.is_none()
    }
}

// Tokens never end up in logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |t: &Option<String>| t.as_ref().map(|_| "<redacted>");
        f.debug_struct("Credential")
            .field("access", &mask(&self.access))
            .field("refresh", &mask(&self.refresh))
            .finish()
    }
}

/// Where the session stands in the login protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Anonymous,
    /// Password accepted, waiting for the one-time code.
    MfaPending,
    /// Password accepted, the account must enroll an authenticator first.
    MfaSetupPending { otp_url: String },
    Authenticated,
}

/// Login step the server is waiting on, tracked between calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PendingStep {
    Verification,
    Enrollment { otp_url: String },
}

#[derive(Debug, Default)]
struct StoreState {
    credential: Credential,
    pending: Option<PendingStep>,
}

/// Holds the current credential and login step for one client.
///
/// Reads are open to every component. Writes are crate-private and made
/// only by the session layer; each one replaces the whole value.
pub struct CredentialStore {
    state: RwLock<StoreState>,
    persistence: Option<Box<dyn TokenPersistence>>,
}

impl CredentialStore {
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            persistence: None,
        }
    }

    /// Create a store backed by durable storage, seeded from what it holds.
    pub fn with_persistence(persistence: Box<dyn TokenPersistence>) -> Self {
        let credential = match persistence.load() {
            Ok(Some(credential)) => {
                debug!(has_access = credential.access.is_some(), "Restored persisted session");
                credential
            }
            Ok(None) => Credential::default(),
            Err(e) => {
                warn!(error = %e, "Failed to load persisted session, starting anonymous");
                Credential::default()
            }
        };

        Self {
            state: RwLock::new(StoreState {
                credential,
                pending: None,
            }),
            persistence: Some(persistence),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> Credential {
        self.read().credential.clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().credential.access.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read().credential.refresh.clone()
    }

    pub fn status(&self) -> SessionStatus {
        let state = self.read();
        if state.credential.access.is_some() {
            return SessionStatus::Authenticated;
        }
        match &state.pending {
            Some(PendingStep::Verification) => SessionStatus::MfaPending,
            Some(PendingStep::Enrollment { otp_url }) => SessionStatus::MfaSetupPending {
                otp_url: otp_url.clone(),
            },
            None => SessionStatus::Anonymous,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == SessionStatus::Authenticated
    }

    /// Commit a new credential, ending any pending login step.
    pub(crate) fn set(&self, credential: Credential) {
        let mut state = self.write();
        state.credential = credential;
        state.pending = None;
        self.save_locked(&state.credential);
    }

    /// Forget the credential and any pending login step.
    pub(crate) fn clear(&self) {
        let mut state = self.write();
        state.credential = Credential::default();
        state.pending = None;
        self.clear_locked();
    }

    /// Commit `credential` only if the stored refresh token is still
    /// `expected`. Returns whether the commit happened.
    pub(crate) fn replace_if_refresh(&self, expected: &str, credential: Credential) -> bool {
        let mut state = self.write();
        if state.credential.refresh.as_deref() != Some(expected) {
            return false;
        }
        state.credential = credential;
        state.pending = None;
        self.save_locked(&state.credential);
        true
    }

    /// Clear only if the stored refresh token is still `expected`. Returns
    /// whether the clear happened.
    pub(crate) fn clear_if_refresh(&self, expected: &str) -> bool {
        let mut state = self.write();
        if state.credential.refresh.as_deref() != Some(expected) {
            return false;
        }
        state.credential = Credential::default();
        state.pending = None;
        self.clear_locked();
        true
    }

    /// Enter a second-factor step. Any previous credential is dropped.
    pub(crate) fn begin_step(&self, step: PendingStep) {
        let mut state = self.write();
        let had_credential = !state.credential.is_empty();
        state.credential = Credential::default();
        state.pending = Some(step);
        if had_credential {
            self.clear_locked();
        }
    }

    // Persistence writes happen under the state lock so durable storage
    // is updated in the same order as memory.
    fn save_locked(&self, credential: &Credential) {
        if let Some(ref persistence) = self.persistence {
            if let Err(e) = persistence.save(credential) {
                warn!(error = %e, "Failed to persist session");
            }
        }
    }

    fn clear_locked(&self) {
        if let Some(ref persistence) = self.persistence {
            if let Err(e) = persistence.clear() {
                warn!(error = %e, "Failed to clear persisted session");
            }
        }
    }

    pub(crate) fn end_step(&self) {
        self.write().pending = None;
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::in_memory()
    }
}
