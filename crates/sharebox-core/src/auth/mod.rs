//! Authentication module for managing the token session.
//!
//! This module provides:
//! - `CredentialStore`: the current access/refresh pair and login step
//! - `TokenPersistence`: session file or OS keychain backing for the store
//! - `SessionManager`: login, second factor, enrollment, logout, account calls
//! - `TokenRenewer`: the refresh protocol the gateway calls on a 401
//!
//! A second factor is always required: a password alone never authenticates.

pub mod credentials;
pub mod persist;
pub mod session;

pub use credentials::{Credential, CredentialStore, SessionStatus};
pub use persist::{KeyringTokens, SessionFile, TokenPersistence};
pub use session::{LoginOutcome, SessionManager, TokenRenewer};
