//! Sharebox core library.
//!
//! Client for a file-sharing API with password + one-time-code login and a
//! short-lived bearer access token. Every domain call goes through the
//! [`api::ApiGateway`], which attaches the current token and transparently
//! refreshes it when the server rejects it.
//!
//! # Modules
//!
//! - [`api`] - HTTP transport, request descriptors, gateway and errors
//! - [`auth`] - credential store, persistence, login/refresh/logout
//! - [`files`] - upload, download, sharing and email actions
//! - [`admin`] - administrator user and file management
//! - [`models`] - wire types
//! - [`config`] - client configuration

pub mod admin;
pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod files;
pub mod models;
pub mod validation;

pub use admin::AdminApi;
pub use api::{ApiError, ApiGateway};
pub use auth::{Credential, CredentialStore, LoginOutcome, SessionManager, SessionStatus};
pub use client::ShareboxClient;
pub use config::{ClientConfig, PersistenceKind};
pub use files::FilesApi;
