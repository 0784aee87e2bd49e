//! Raw HTTP transport: turns a `RequestDescriptor` into a `reqwest` call.
//!
//! The transport knows nothing about sessions. It attaches whatever bearer
//! it is handed and leaves status handling to the gateway.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::multipart::{Form, Part};
use reqwest::{header, Client, Response, Url};
use tracing::debug;

use super::request::{FieldValue, FormField, RequestBody, RequestDescriptor};
use super::ApiError;

/// Header the server expects the CSRF cookie value echoed in.
const CSRF_HEADER: &str = "X-CSRFToken";

/// HTTP transport bound to one API base URL.
/// Clone is cheap - reqwest::Client and the cookie jar are shared.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    jar: Arc<Jar>,
    csrf_cookie: Option<String>,
}

impl HttpTransport {
    pub fn new(
        base_url: Url,
        request_timeout: Duration,
        csrf_cookie: Option<String>,
    ) -> Result<Self, ApiError> {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .timeout(request_timeout)
            .cookie_provider(Arc::clone(&jar))
            .build()?;

        Ok(Self {
            client,
            base_url,
            jar,
            csrf_cookie,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a path relative to the API base.
    pub fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Validation(format!("Invalid request path {}: {}", path, e)))
    }

    fn csrf_token(&self, url: &Url) -> Option<String> {
        let name = self.csrf_cookie.as_deref()?;
        let cookies = self.jar.cookies(url)?;
        let cookies = cookies.to_str().ok()?;
        cookies.split(';').find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
    }

    fn build_form(fields: &[FormField]) -> Result<Form, ApiError> {
        let mut form = Form::new();
        for field in fields {
            form = match &field.value {
                FieldValue::Text(text) => form.text(field.name.clone(), text.clone()),
                FieldValue::File {
                    file_name,
                    content_type,
                    data,
                } => {
                    let mut part = Part::bytes(data.to_vec()).file_name(file_name.clone());
                    if let Some(mime) = content_type {
                        part = part.mime_str(mime).map_err(|e| {
                            ApiError::Validation(format!("Invalid content type {}: {}", mime, e))
                        })?;
                    }
                    form.part(field.name.clone(), part)
                }
            };
        }
        Ok(form)
    }

    /// Send a request as-is, attaching `bearer` when given.
    pub async fn send(
        &self,
        descriptor: &RequestDescriptor,
        bearer: Option<&str>,
    ) -> Result<Response, ApiError> {
        let url = self.url(&descriptor.path)?;

        let mut builder = self
            .client
            .request(descriptor.method.clone(), url.clone())
            .header(header::ACCEPT, "application/json");

        if !descriptor.query.is_empty() {
            builder = builder.query(&descriptor.query);
        }
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(csrf) = self.csrf_token(&url) {
            builder = builder.header(CSRF_HEADER, csrf);
        }

        builder = match &descriptor.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(fields) => builder.multipart(Self::build_form(fields)?),
        };

        debug!(
            method = %descriptor.method,
            path = %descriptor.path,
            authenticated = bearer.is_some(),
            retry = descriptor.is_retry,
            "Sending request"
        );

        Ok(builder.send().await?)
    }

    /// Check if response is successful, returning an error with body if not.
    pub async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() || response.status().is_redirection() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }
}
