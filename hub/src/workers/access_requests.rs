//! Access-request forwarder
//!
//! Drains requests queued by the permission gate and hands them to the
//! administrator channel, which for now is the structured log.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;
use tracing::info;

use crate::permissions::access::AccessRequest;

/// Run the forwarder until shutdown or until every sender is gone
pub async fn run(
    mut requests: mpsc::UnboundedReceiver<AccessRequest>,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) -> usize {
    info!("Access request forwarder starting...");
    let mut forwarded = 0;

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Access request forwarder shutting down...");
                return forwarded;
            }
            request = requests.recv() => {
                let Some(request) = request else {
                    return forwarded;
                };
                info!(
                    request_id = %request.id,
                    feature = %request.feature,
                    identity_id = %request.identity_id,
                    identity_kind = request.identity_kind,
                    requested_at = %request.requested_at,
                    "Access requested"
                );
                forwarded += 1;
            }
        }
    }
}
