//! API gateway: the single funnel every domain call goes through.
//!
//! Bearer requests get the stored access token. A 401 on one of them is
//! recovered by refreshing the token pair (at most one refresh in flight,
//! shared by every request that hit the 401) and resending the request once.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::auth::{Credential, CredentialStore};

use super::request::{AuthMode, RequestDescriptor};
use super::transport::HttpTransport;
use super::ApiError;

/// Logout is never recovered through a refresh.
pub const LOGOUT_PATH: &str = "auth/logout/";

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// The refresh capability the gateway needs from the session layer.
pub trait TokenRefresher: Send + Sync {
    /// Exchange `refresh_token` for a new pair. On success the pair is
    /// already committed; on failure the session is already cleared. Neither
    /// happens if the session moved past `refresh_token` in the meantime.
    fn refresh(&self, refresh_token: String) -> BoxFuture<'_, Result<Credential, ApiError>>;

    /// Drop the local session without contacting the server.
    fn expire_session(&self);
}

type PendingRefresh = Shared<BoxFuture<'static, Result<Credential, ApiError>>>;

/// Clears the pending-refresh marker when the refresh task ends, however it ends.
struct MarkerRelease(Arc<Mutex<Option<PendingRefresh>>>);

impl Drop for MarkerRelease {
    fn drop(&mut self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

pub struct ApiGateway {
    transport: HttpTransport,
    store: Arc<CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    pending: Arc<Mutex<Option<PendingRefresh>>>,
}

impl ApiGateway {
    pub fn new(
        transport: HttpTransport,
        store: Arc<CredentialStore>,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        Self {
            transport,
            store,
            refresher,
            pending: Arc::new(Mutex::new(None)),
        }
    }

    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Whether a refresh is currently in flight.
    pub fn refresh_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Send a request, recovering once from an expired access token.
    pub async fn request(&self, descriptor: RequestDescriptor) -> Result<Response, ApiError> {
        let sent_token = match descriptor.auth {
            AuthMode::Bearer => self.store.access_token(),
            AuthMode::Anonymous => None,
        };

        let response = self.dispatch(&descriptor, sent_token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED || !Self::recoverable(&descriptor) {
            return HttpTransport::check_response(response).await;
        }

        let body = response.text().await.unwrap_or_default();
        debug!(path = %descriptor.path, "Access token rejected");

        let credential = self.renewed_credential(sent_token.as_deref(), &body).await?;
        let retry = descriptor.as_retry();
        let response = self.dispatch(&retry, credential.access.as_deref()).await?;
        HttpTransport::check_response(response).await
    }

    /// Send a request and decode its JSON body.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        descriptor: RequestDescriptor,
    ) -> Result<T, ApiError> {
        let path = descriptor.path.clone();
        let response = self.request(descriptor).await?;
        response.json().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", path, e))
        })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json(RequestDescriptor::get(path)).await
    }

    /// Send a request whose response body is irrelevant.
    pub async fn send_discard(&self, descriptor: RequestDescriptor) -> Result<(), ApiError> {
        self.request(descriptor).await.map(|_| ())
    }

    fn recoverable(descriptor: &RequestDescriptor) -> bool {
        descriptor.auth == AuthMode::Bearer
            && !descriptor.is_retry
            && descriptor.path.trim_start_matches('/') != LOGOUT_PATH
    }

    /// Send, backing off on 429. Auth retries are handled in `request`.
    async fn dispatch(
        &self,
        descriptor: &RequestDescriptor,
        bearer: Option<&str>,
    ) -> Result<Response, ApiError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self.transport.send(descriptor, bearer).await?;
            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }

            retries += 1;
            if retries > MAX_RATE_LIMIT_RETRIES {
                return Err(ApiError::RateLimited);
            }
            warn!(path = %descriptor.path, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            backoff_ms *= 2;
        }
    }

    /// Obtain a credential newer than `sent_token`, refreshing if needed.
    async fn renewed_credential(
        &self,
        sent_token: Option<&str>,
        rejected_body: &str,
    ) -> Result<Credential, ApiError> {
        let in_flight = {
            let mut slot = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.clone() {
                Some(in_flight) => {
                    debug!("Joining in-flight token refresh");
                    in_flight
                }
                None => {
                    // A refresh may have completed after this request went out.
                    let current = self.store.get();
                    if current.access.is_some() && current.access.as_deref() != sent_token {
                        debug!("Token already refreshed, retrying with stored credential");
                        return Ok(current);
                    }

                    let Some(refresh_token) = current.refresh else {
                        drop(slot);
                        info!("No refresh token available, ending session");
                        self.refresher.expire_session();
                        return Err(ApiError::Unauthorized(ApiError::message_from_body(
                            rejected_body,
                        )));
                    };

                    let shared = self.start_refresh(refresh_token);
                    *slot = Some(shared.clone());
                    shared
                }
            }
        };

        in_flight.await
    }

    /// Spawn the refresh so it runs to completion even if every caller goes away.
    fn start_refresh(&self, refresh_token: String) -> PendingRefresh {
        debug!("Starting token refresh");
        let refresher = Arc::clone(&self.refresher);
        let release = MarkerRelease(Arc::clone(&self.pending));

        let task = tokio::spawn(async move {
            let _release = release;
            refresher.refresh(refresh_token).await
        });

        async move {
            task.await.unwrap_or_else(|e| {
                warn!(error = %e, "Token refresh task aborted");
                Err(ApiError::InvalidResponse(format!("Token refresh aborted: {}", e)))
            })
        }
        .boxed()
        .shared()
    }
}
