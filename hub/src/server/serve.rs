//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, patch, post, put},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::HubError;
use crate::server::handlers::{
    alerts_handler, devices_handler, dismiss_alert_handler, energy_series_handler,
    energy_summary_handler, health_handler, permission_handler, poll_suggestions_handler,
    register_device_handler, remove_device_handler, rename_room_handler,
    request_access_handler, room_energy_handler, rooms_handler, save_rooms_handler,
    set_status_handler, sign_in_handler, sign_out_handler, suggestions_handler,
    toggle_device_handler, update_device_handler, version_handler,
};
use crate::server::proxy::{
    collect_statistics_handler, create_report_handler, download_report_handler, report_handler,
    weather_handler,
};
use crate::server::state::ServerState;

/// Build the application router
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Session
        .route("/session", post(sign_in_handler).delete(sign_out_handler))
        // Devices and rooms
        .route("/devices", get(devices_handler).post(register_device_handler))
        .route(
            "/devices/{id}",
            patch(update_device_handler).delete(remove_device_handler),
        )
        .route("/devices/{id}/toggle", post(toggle_device_handler))
        .route("/devices/{id}/status", put(set_status_handler))
        .route("/rooms", get(rooms_handler).put(save_rooms_handler))
        .route("/rooms/{name}/rename", post(rename_room_handler))
        // Energy
        .route("/energy/summary", get(energy_summary_handler))
        .route("/energy/series", get(energy_series_handler))
        .route("/energy/rooms/{room}", get(room_energy_handler))
        // Permissions
        .route("/permissions/{feature}", get(permission_handler))
        .route(
            "/permissions/{feature}/request-access",
            post(request_access_handler),
        )
        // Suggestions
        .route("/suggestions", get(suggestions_handler))
        .route("/suggestions/poll", post(poll_suggestions_handler))
        .route("/alerts", get(alerts_handler))
        .route("/alerts/{id}/dismiss", post(dismiss_alert_handler))
        // Backend proxy
        .route("/api/reports", get(report_handler))
        .route("/api/reports/download", get(download_report_handler))
        .route("/api/reports/create", post(create_report_handler))
        .route("/api/statistics/collect", post(collect_statistics_handler))
        .route("/api/weather", get(weather_handler))
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), HubError>>, HubError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| HubError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| HubError::ServerError(e.to_string()))
    });

    Ok(handle)
}
