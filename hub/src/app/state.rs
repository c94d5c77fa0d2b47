//! Application state management

use std::sync::Arc;

use chrono::FixedOffset;
use tokio::sync::mpsc;
use tracing::info;

use crate::app::options::AppOptions;
use crate::errors::HubError;
use crate::http::client::BackendClient;
use crate::notifier::alerts::Alerts;
use crate::notifier::poll::SuggestionNotifier;
use crate::notifier::source::BackendSuggestionSource;
use crate::permissions::access::{AccessRequest, ChannelAccessRequests};
use crate::permissions::gate::PermissionGate;
use crate::server::state::ServerState;
use crate::storage::devices::DeviceRepo;
use crate::storage::store::{FileStore, Store};

/// Main application state
pub struct AppState {
    /// Versioned key-value store
    pub store: Arc<Store>,

    /// Device and room collections
    pub repo: Arc<DeviceRepo>,

    /// Feature gate over the resident identity
    pub gate: Arc<PermissionGate>,

    /// Sink for "request access" submissions
    pub access_requests: Arc<ChannelAccessRequests>,

    /// HTTP client for backend communication
    pub backend: Arc<BackendClient>,

    /// Suggestion diffing and alerts
    pub notifier: Arc<SuggestionNotifier>,

    chart_offset: FixedOffset,
}

impl AppState {
    /// Initialize application state.
    ///
    /// Also returns the receiving end of the access-request queue, which the
    /// forwarder worker drains.
    pub async fn init(
        options: &AppOptions,
    ) -> Result<(Self, mpsc::UnboundedReceiver<AccessRequest>), HubError> {
        info!("Initializing application state...");

        let store_dir = options.layout.store_dir();
        store_dir.create().await?;
        let store = Arc::new(Store::new(Arc::new(FileStore::new(store_dir))));

        let backend = Arc::new(BackendClient::new(
            &options.backend_base_url,
            options.backend_timeout,
        )?);

        Ok(Self::assemble(store, backend, options))
    }

    /// Wire state over an existing store and backend client
    pub fn assemble(
        store: Arc<Store>,
        backend: Arc<BackendClient>,
        options: &AppOptions,
    ) -> (Self, mpsc::UnboundedReceiver<AccessRequest>) {
        let repo = Arc::new(DeviceRepo::new(store.clone()));
        let gate = Arc::new(PermissionGate::new(store.clone()));
        let (access_requests, access_rx) = ChannelAccessRequests::new();

        let alert_ttl = options
            .alert_ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok());
        let source = Arc::new(BackendSuggestionSource::new(backend.clone(), store.clone()));
        let notifier = Arc::new(SuggestionNotifier::new(
            repo.clone(),
            store.clone(),
            source,
            Arc::new(Alerts::new(alert_ttl)),
        ));

        let state = Self {
            store,
            repo,
            gate,
            access_requests: Arc::new(access_requests),
            backend,
            notifier,
            chart_offset: options.chart_offset,
        };
        (state, access_rx)
    }

    /// State handed to the HTTP handlers
    pub fn server_state(&self) -> ServerState {
        ServerState::new(
            self.store.clone(),
            self.repo.clone(),
            self.gate.clone(),
            self.access_requests.clone(),
            self.notifier.clone(),
            self.backend.clone(),
            self.chart_offset,
        )
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), HubError> {
        info!("Shutting down application state...");
        self.notifier.alerts().clear();
        Ok(())
    }
}
