//! One fully wired client: store, transport, refresher, gateway and the
//! action facades on top of them.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::admin::AdminApi;
use crate::api::{ApiGateway, HttpTransport};
use crate::auth::{CredentialStore, SessionManager, SessionStatus, TokenRenewer};
use crate::config::ClientConfig;
use crate::files::FilesApi;

pub struct ShareboxClient {
    store: Arc<CredentialStore>,
    gateway: Arc<ApiGateway>,
    session: SessionManager,
    files: FilesApi,
    admin: AdminApi,
}

impl ShareboxClient {
    /// Build a client using the configured persistence backend.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let store = match config.token_persistence()? {
            Some(persistence) => CredentialStore::with_persistence(persistence),
            None => CredentialStore::in_memory(),
        };
        Self::with_store(config, Arc::new(store))
    }

    /// Build a client around an existing store.
    pub fn with_store(config: &ClientConfig, store: Arc<CredentialStore>) -> Result<Self> {
        let base_url = config.base_url()?;
        let transport = HttpTransport::new(
            base_url.clone(),
            config.request_timeout(),
            config.csrf_cookie_name.clone(),
        )
        .context("Failed to build HTTP client")?;

        // The refresher shares the transport (and its cookie jar) but not the gateway
        let renewer = TokenRenewer::new(
            transport.clone(),
            Arc::clone(&store),
            config.refresh_timeout(),
        );
        let gateway = Arc::new(ApiGateway::new(
            transport,
            Arc::clone(&store),
            Arc::new(renewer),
        ));

        debug!(base_url = %base_url, status = ?store.status(), "Client ready");

        Ok(Self {
            session: SessionManager::new(Arc::clone(&gateway), config.refresh_timeout()),
            files: FilesApi::new(Arc::clone(&gateway)),
            admin: AdminApi::new(Arc::clone(&gateway)),
            store,
            gateway,
        })
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn files(&self) -> &FilesApi {
        &self.files
    }

    pub fn admin(&self) -> &AdminApi {
        &self.admin
    }

    pub fn status(&self) -> SessionStatus {
        self.store.status()
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn gateway(&self) -> &Arc<ApiGateway> {
        &self.gateway
    }
}
