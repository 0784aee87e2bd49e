//! REST API plumbing for the sharebox server.
//!
//! This module provides the `ApiGateway` every feature call goes through
//! and the raw `HttpTransport` underneath it. Failures are `ApiError`s.
//!
//! The API uses JWT bearer authentication. Access tokens are short-lived and
//! renewed transparently through the refresh endpoint.

pub mod error;
pub mod gateway;
pub mod request;
pub mod transport;

pub use error::ApiError;
pub use gateway::{ApiGateway, TokenRefresher};
pub use request::{AuthMode, FormField, RequestBody, RequestDescriptor};
pub use transport::HttpTransport;
