//! Server state

use std::sync::Arc;

use chrono::FixedOffset;

use crate::http::client::BackendClient;
use crate::notifier::poll::SuggestionNotifier;
use crate::permissions::access::AccessRequests;
use crate::permissions::gate::PermissionGate;
use crate::storage::devices::DeviceRepo;
use crate::storage::store::Store;

/// Server state shared across handlers
pub struct ServerState {
    pub store: Arc<Store>,
    pub repo: Arc<DeviceRepo>,
    pub gate: Arc<PermissionGate>,
    pub access_requests: Arc<dyn AccessRequests>,
    pub notifier: Arc<SuggestionNotifier>,
    pub backend: Arc<BackendClient>,
    /// Offset used to align chart buckets
    pub chart_offset: FixedOffset,
}

impl ServerState {
    pub fn new(
        store: Arc<Store>,
        repo: Arc<DeviceRepo>,
        gate: Arc<PermissionGate>,
        access_requests: Arc<dyn AccessRequests>,
        notifier: Arc<SuggestionNotifier>,
        backend: Arc<BackendClient>,
        chart_offset: FixedOffset,
    ) -> Self {
        Self {
            store,
            repo,
            gate,
            access_requests,
            notifier,
            backend,
            chart_offset,
        }
    }
}
