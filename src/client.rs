//! Composition root: wires config, transport, session cache and sync into one
//! handle with an explicit lifecycle.

use std::sync::Arc;

use tracing::info;

use crate::api::TravelApi;
use crate::auth::AuthFlowController;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::gateway::{ReqwestTransport, RequestGateway, Transport};
use crate::session::{LibSqlSlotBackend, SessionStatus, SessionStore, SlotBackend};
use crate::sync::DataSyncCoordinator;

pub struct TravelClient {
    config: ClientConfig,
    session: Arc<SessionStore>,
    sync: Arc<DataSyncCoordinator>,
}

impl TravelClient {
    /// Open the durable session file and build the HTTP transport.
    pub async fn open(config: ClientConfig) -> Result<Self> {
        let backend = LibSqlSlotBackend::new_local(&config.session_db_path).await?;
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_parts(config, Arc::new(transport), Arc::new(backend)))
    }

    pub fn with_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        backend: Arc<dyn SlotBackend>,
    ) -> Self {
        let session = SessionStore::new(backend);
        let gateway = RequestGateway::new(transport, session.clone(), config.retry);
        let api = Arc::new(TravelApi::new(gateway));
        let sync = DataSyncCoordinator::new(api, session.clone());
        Self {
            config,
            session,
            sync,
        }
    }

    /// Load the cached session and, when signed in, refresh it from the server.
    ///
    /// The status is read after the refresh, so a session the server rejected
    /// reports `Unauthenticated`.
    pub async fn start(&self) -> Result<SessionStatus> {
        if self.session.load().await? == SessionStatus::Authenticated {
            self.sync.refresh().await;
        }
        let status = if self.session.is_authenticated().await {
            SessionStatus::Authenticated
        } else {
            SessionStatus::Unauthenticated
        };
        info!(
            mode = ?self.config.mode,
            base_url = %self.config.base_url,
            status = ?status,
            "Travel client started"
        );
        Ok(status)
    }

    /// A fresh flow controller, starting at the login screen.
    pub fn auth_flow(&self) -> AuthFlowController {
        AuthFlowController::new(self.sync.clone())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn sync(&self) -> &Arc<DataSyncCoordinator> {
        &self.sync
    }

    pub fn api(&self) -> &Arc<TravelApi> {
        self.sync.api()
    }
}
