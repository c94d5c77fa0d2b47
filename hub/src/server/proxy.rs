//! Backend proxy handlers
//!
//! Stateless forwarders for reports, statistics and weather. Upstream
//! non-2xx replies keep their status and surface `{error, details}`.
//! Transport or decode failures become a generic 500, except weather,
//! which degrades to a fixed fallback payload.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use http::{header, HeaderValue, StatusCode};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::errors::HubError;
use crate::http::client::UpstreamResponse;
use crate::server::state::ServerState;
use crate::storage::session::load_session;

/// Proxy failure, rendered as `{error, details}`
#[derive(Debug)]
pub enum ProxyError {
    MissingParam(&'static str),
    InvalidParam(&'static str),
    Upstream { status: StatusCode, body: String },
    Internal(String),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            ProxyError::MissingParam(name) => (
                StatusCode::BAD_REQUEST,
                format!("Missing required parameter: {}", name),
                Value::Null,
            ),
            ProxyError::InvalidParam(name) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid parameter: {}", name),
                Value::Null,
            ),
            ProxyError::Upstream { status, body } => (
                status,
                format!("Backend error: {}", status),
                serde_json::from_str(&body).unwrap_or(Value::String(body)),
            ),
            ProxyError::Internal(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                Value::String(details),
            ),
        };
        (status, Json(json!({ "error": error, "details": details }))).into_response()
    }
}

impl From<HubError> for ProxyError {
    fn from(err: HubError) -> Self {
        error!("Proxy request failed: {}", err);
        ProxyError::Internal(err.to_string())
    }
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ProxyError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ProxyError::MissingParam(name))
}

/// A report id must stay a single upstream path segment
fn report_segment(value: Option<String>) -> Result<String, ProxyError> {
    let id = required(value, "report_id")?;
    let escapes = id == "."
        || id == ".."
        || id
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_control());
    if escapes {
        warn!(report_id = %id, "Rejecting report id that is not a single path segment");
        return Err(ProxyError::InvalidParam("report_id"));
    }
    Ok(id)
}

fn ensure_success(response: UpstreamResponse) -> Result<UpstreamResponse, ProxyError> {
    if response.is_success() {
        return Ok(response);
    }
    warn!("Backend replied {}", response.status);
    Err(ProxyError::Upstream {
        status: response.status,
        body: response.text(),
    })
}

fn decode_json(response: &UpstreamResponse) -> Result<Value, ProxyError> {
    serde_json::from_slice(&response.body)
        .map_err(|e| ProxyError::Internal(format!("malformed backend response: {}", e)))
}

async fn forward(
    state: &ServerState,
    method: Method,
    path: &str,
    query: &[(&str, &str)],
    body: Option<Bytes>,
) -> Result<UpstreamResponse, HubError> {
    let session = load_session(&state.store).await?;
    state
        .backend
        .forward(method, path, query, body, session.as_ref())
        .await
}

// ================================== REPORTS ==================================== //

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub report_id: Option<String>,
}

/// GET /api/reports?report_id= → GET /reports/{id}
pub async fn report_handler(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Value>, ProxyError> {
    let report_id = report_segment(query.report_id)?;
    let path = format!("/reports/{}", report_id);
    let response = ensure_success(forward(&state, Method::GET, &path, &[], None).await?)?;
    Ok(Json(decode_json(&response)?))
}

/// Extract the filename from a `Content-Disposition` value
pub fn disposition_filename(disposition: &str) -> Option<String> {
    disposition
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

/// GET /api/reports/download?report_id= → GET /reports/{id}/download
pub async fn download_report_handler(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ProxyError> {
    let report_id = report_segment(query.report_id)?;
    let path = format!("/reports/{}/download", report_id);
    let response = ensure_success(forward(&state, Method::GET, &path, &[], None).await?)?;

    let filename = response
        .header_str(header::CONTENT_DISPOSITION)
        .and_then(disposition_filename)
        .unwrap_or_else(|| format!("report-{}.pdf", report_id));
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        .map_err(|e| ProxyError::Internal(format!("invalid filename: {}", e)))?;
    let content_type = response
        .headers
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        response.body,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct CreateReportQuery {
    pub user_id: Option<String>,
}

/// POST /api/reports/create?user_id= → POST /reports/create?user_id=
pub async fn create_report_handler(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<CreateReportQuery>,
    body: Bytes,
) -> Result<Json<Value>, ProxyError> {
    let user_id = required(query.user_id, "user_id")?;
    let response = ensure_success(
        forward(
            &state,
            Method::POST,
            "/reports/create",
            &[("user_id", user_id.as_str())],
            Some(body),
        )
        .await?,
    )?;
    Ok(Json(decode_json(&response)?))
}

// ================================ STATISTICS =================================== //

/// POST /api/statistics/collect → POST /statistics/collect
pub async fn collect_statistics_handler(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Json<Value>, ProxyError> {
    let response = ensure_success(
        forward(&state, Method::POST, "/statistics/collect", &[], Some(body)).await?,
    )?;
    Ok(Json(decode_json(&response)?))
}

// ================================== WEATHER ==================================== //

#[derive(Debug, Deserialize)]
pub struct WeatherQuery {
    pub city: Option<String>,
    pub units: Option<String>,
}

/// Payload served when the weather backend cannot be reached
pub fn weather_fallback(city: &str, units: &str) -> Value {
    json!({
        "fallback": true,
        "city": city,
        "units": units,
        "temperature": null,
        "feels_like": null,
        "humidity": null,
        "wind_speed": null,
        "description": "Weather data unavailable",
        "icon": "unknown"
    })
}

/// GET /api/weather?city=&units= → GET /weather?city=&units=
pub async fn weather_handler(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<WeatherQuery>,
) -> Result<Json<Value>, ProxyError> {
    let city = required(query.city, "city")?;
    let units = query
        .units
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| "metric".to_string());

    let response = match forward(
        &state,
        Method::GET,
        "/weather",
        &[("city", city.as_str()), ("units", units.as_str())],
        None,
    )
    .await
    {
        Ok(response) => response,
        Err(e) => {
            warn!("Weather backend unreachable, serving fallback: {}", e);
            return Ok(Json(weather_fallback(&city, &units)));
        }
    };

    let response = ensure_success(response)?;
    match decode_json(&response) {
        Ok(value) => Ok(Json(value)),
        Err(_) => {
            warn!("Weather backend sent malformed data, serving fallback");
            Ok(Json(weather_fallback(&city, &units)))
        }
    }
}
