//! Outbound request descriptors.
//!
//! A descriptor is plain data so the gateway can resend it unchanged after
//! a token refresh. Multipart bodies are kept as fields and rebuilt into a
//! `reqwest` form on every send.

use bytes::Bytes;
use reqwest::Method;
use serde::Serialize;

use super::ApiError;

/// Whether a request carries the session's bearer credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Attach `Authorization: Bearer <access>` and recover from 401 via refresh.
    Bearer,
    /// Never attach a credential, never intercept 401.
    Anonymous,
}

#[derive(Debug, Clone)]
pub enum FieldValue {
    Text(String),
    File {
        file_name: String,
        content_type: Option<String>,
        data: Bytes,
    },
}

#[derive(Debug, Clone)]
pub struct FormField {
    pub name: String,
    pub value: FieldValue,
}

impl FormField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Text(value.into()),
        }
    }

    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: Option<String>,
        data: Bytes,
    ) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::File {
                file_name: file_name.into(),
                content_type,
                data,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart(Vec<FormField>),
}

#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Path relative to the API base URL, e.g. `files/my-files/`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    pub auth: AuthMode,
    /// Set on the single resend after a refresh; a 401 on it is final.
    pub is_retry: bool,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
            auth: AuthMode::Bearer,
            is_retry: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn anonymous(mut self) -> Self {
        self.auth = AuthMode::Anonymous;
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::Validation(format!("Failed to encode request body: {}", e)))?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    pub fn multipart(mut self, fields: Vec<FormField>) -> Self {
        self.body = RequestBody::Multipart(fields);
        self
    }

    /// The one-time resend of this request after a successful refresh.
    pub(crate) fn as_retry(&self) -> Self {
        Self {
            is_retry: true,
            ..self.clone()
        }
    }
}
