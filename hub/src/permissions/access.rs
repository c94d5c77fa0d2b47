//! "Request access" submissions forwarded to administrators

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

use crate::models::identity::{Feature, Identity};
use crate::utils::generate_uuid;

/// A request from an identity to be granted a feature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessRequest {
    pub id: String,
    pub feature: Feature,
    pub identity_id: String,
    pub identity_kind: &'static str,
    pub identity_name: String,
    pub requested_at: DateTime<Utc>,
}

impl AccessRequest {
    pub fn new(identity: &Identity, feature: Feature, requested_at: DateTime<Utc>) -> Self {
        Self {
            id: generate_uuid(),
            feature,
            identity_id: identity.id().to_string(),
            identity_kind: identity.kind(),
            identity_name: identity.display_name().to_string(),
            requested_at,
        }
    }
}

/// Fire-and-forget sink for access requests
pub trait AccessRequests: Send + Sync {
    /// Hand the request off; delivery is not confirmed
    fn submit(&self, request: AccessRequest);
}

/// Queues requests for the access-request forwarder worker
pub struct ChannelAccessRequests {
    tx: mpsc::UnboundedSender<AccessRequest>,
}

impl ChannelAccessRequests {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AccessRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl AccessRequests for ChannelAccessRequests {
    fn submit(&self, request: AccessRequest) {
        if let Err(e) = self.tx.send(request) {
            warn!(request_id = %e.0.id, "Access request dropped, forwarder is gone");
        }
    }
}
