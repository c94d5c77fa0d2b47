//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::energy::{
    calculate_room_energy, device_breakdown, house_total, room_breakdown, usage_series,
    DeviceEnergy, Granularity, RoomEnergy, UsagePoint,
};
use crate::errors::HubError;
use crate::models::device::{AttributeUpdate, Device, DeviceStatus};
use crate::models::identity::{Feature, Identity, Member, User};
use crate::models::room::Room;
use crate::models::suggestion::Suggestion;
use crate::notifier::alerts::Alert;
use crate::notifier::poll::PollOutcome;
use crate::permissions::access::AccessRequest;
use crate::permissions::gate::{DenialNotice, GateOutcome};
use crate::server::state::ServerState;
use crate::storage::session::{
    clear_credentials, clear_session, save_identity, save_session, Session,
};
use crate::utils::{now_millis, version_info};

/// Error reply for local endpoints
#[derive(Debug)]
pub enum ApiError {
    Hub(HubError),
    Unauthenticated { to: String },
    Forbidden(DenialNotice),
}

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        ApiError::Hub(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthenticated { to } => (
                StatusCode::UNAUTHORIZED,
                Json(GateOutcome::RedirectToLogin { to }),
            )
                .into_response(),
            ApiError::Forbidden(notice) => {
                (StatusCode::FORBIDDEN, Json(GateOutcome::Denied { notice })).into_response()
            }
            ApiError::Hub(err) => {
                let status = match &err {
                    HubError::NotFound(_) => StatusCode::NOT_FOUND,
                    HubError::ValidationError(_) => StatusCode::BAD_REQUEST,
                    HubError::UpstreamError { .. }
                    | HubError::HttpError(_)
                    | HubError::SuggestionError(_) => StatusCode::BAD_GATEWAY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    error!("Request failed: {}", err);
                }
                (
                    status,
                    Json(ErrorBody {
                        error: err.to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

/// Pass only when the resident identity may use `feature`
async fn require(state: &ServerState, feature: Feature) -> Result<(), ApiError> {
    match state.gate.guard(feature).await? {
        GateOutcome::Allowed => Ok(()),
        GateOutcome::Denied { notice } => Err(ApiError::Forbidden(notice)),
        GateOutcome::RedirectToLogin { to } => Err(ApiError::Unauthenticated { to }),
    }
}

// ================================= SERVICE ===================================== //

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "homehub".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    Json(version_info())
}

// ================================= SESSION ===================================== //

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub member: Option<Member>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub id: String,
    pub kind: &'static str,
}

/// Make the posted user or member the resident identity
pub async fn sign_in_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<SignInResponse>, ApiError> {
    let identity = match (request.user, request.member) {
        (Some(user), None) => Identity::User(user),
        (None, Some(member)) => Identity::Member(member),
        _ => {
            return Err(HubError::ValidationError(
                "exactly one of user or member is required".to_string(),
            )
            .into())
        }
    };

    save_identity(&state.store, &identity).await?;
    if let Some(token) = request.access_token.filter(|t| !t.is_empty()) {
        let token_type = request.token_type.unwrap_or_else(|| "Bearer".to_string());
        save_session(&state.store, &Session::new(token, token_type)).await?;
    } else {
        clear_credentials(&state.store).await?;
    }
    info!(identity_id = %identity.id(), kind = identity.kind(), "Signed in");

    Ok(Json(SignInResponse {
        id: identity.id().to_string(),
        kind: identity.kind(),
    }))
}

pub async fn sign_out_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<StatusCode, ApiError> {
    clear_session(&state.store).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ================================= DEVICES ===================================== //

pub async fn devices_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<Vec<Device>>, ApiError> {
    require(&state, Feature::Devices).await?;
    Ok(Json(state.repo.load().await?))
}

pub async fn register_device_handler(
    State(state): State<Arc<ServerState>>,
    Json(device): Json<Device>,
) -> Result<(StatusCode, Json<Device>), ApiError> {
    require(&state, Feature::Devices).await?;
    device.check_registration()?;
    state.repo.register(device.clone()).await?;
    Ok((StatusCode::CREATED, Json(device)))
}

pub async fn remove_device_handler(
    State(state): State<Arc<ServerState>>,
    Path(device_id): Path<String>,
) -> Result<Json<Device>, ApiError> {
    require(&state, Feature::Devices).await?;
    Ok(Json(state.repo.remove(&device_id).await?))
}

pub async fn toggle_device_handler(
    State(state): State<Arc<ServerState>>,
    Path(device_id): Path<String>,
) -> Result<Json<Device>, ApiError> {
    require(&state, Feature::Devices).await?;
    let device = state.repo.toggle(&device_id, now_millis()).await?;
    info!(device_id = %device.id, status = ?device.status, "Device toggled");
    Ok(Json(device))
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: DeviceStatus,
}

pub async fn set_status_handler(
    State(state): State<Arc<ServerState>>,
    Path(device_id): Path<String>,
    Json(request): Json<SetStatusRequest>,
) -> Result<Json<Device>, ApiError> {
    require(&state, Feature::Devices).await?;
    let device = state
        .repo
        .set_status(&device_id, request.status, now_millis())
        .await?;
    Ok(Json(device))
}

pub async fn update_device_handler(
    State(state): State<Arc<ServerState>>,
    Path(device_id): Path<String>,
    Json(update): Json<AttributeUpdate>,
) -> Result<Json<Device>, ApiError> {
    require(&state, Feature::Devices).await?;
    let device = state
        .repo
        .update_attributes(&device_id, &update, now_millis())
        .await?;
    Ok(Json(device))
}

pub async fn rooms_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<Vec<Room>>, ApiError> {
    require(&state, Feature::Rooms).await?;
    Ok(Json(state.repo.rooms().await?))
}

/// Replace the room list
pub async fn save_rooms_handler(
    State(state): State<Arc<ServerState>>,
    Json(rooms): Json<Vec<Room>>,
) -> Result<Json<Vec<Room>>, ApiError> {
    require(&state, Feature::Rooms).await?;
    state.repo.save_rooms(&rooms).await?;
    Ok(Json(rooms))
}

#[derive(Debug, Deserialize)]
pub struct RenameRoomRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct RenameRoomResponse {
    pub room: String,
    pub devices_moved: usize,
}

pub async fn rename_room_handler(
    State(state): State<Arc<ServerState>>,
    Path(room): Path<String>,
    Json(request): Json<RenameRoomRequest>,
) -> Result<Json<RenameRoomResponse>, ApiError> {
    require(&state, Feature::Rooms).await?;
    let devices_moved = state.repo.rename_room(&room, &request.name).await?;
    Ok(Json(RenameRoomResponse {
        room: request.name,
        devices_moved,
    }))
}

// ================================== ENERGY ===================================== //

#[derive(Debug, Serialize)]
pub struct RoomEnergyResponse {
    pub room: String,
    pub energy: f64,
}

pub async fn room_energy_handler(
    State(state): State<Arc<ServerState>>,
    Path(room): Path<String>,
) -> Result<Json<RoomEnergyResponse>, ApiError> {
    require(&state, Feature::Energy).await?;
    let devices = state.repo.load().await?;
    let energy = calculate_room_energy(&devices, &room, now_millis());
    Ok(Json(RoomEnergyResponse { room, energy }))
}

#[derive(Debug, Serialize)]
pub struct EnergySummaryResponse {
    pub total: f64,
    pub rooms: Vec<RoomEnergy>,
    pub devices: Vec<DeviceEnergy>,
}

pub async fn energy_summary_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<EnergySummaryResponse>, ApiError> {
    require(&state, Feature::Energy).await?;
    let devices = state.repo.load().await?;
    let rooms = state.repo.rooms().await?;
    let now = now_millis();

    Ok(Json(EnergySummaryResponse {
        total: house_total(&devices, now),
        rooms: room_breakdown(&devices, &rooms, now),
        devices: device_breakdown(&devices, now),
    }))
}

#[derive(Debug, Deserialize)]
pub struct SeriesQuery {
    pub granularity: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SeriesResponse {
    pub granularity: Granularity,
    pub points: Vec<UsagePoint>,
}

pub async fn energy_series_handler(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<SeriesQuery>,
) -> Result<Json<SeriesResponse>, ApiError> {
    require(&state, Feature::Energy).await?;
    let granularity = match query.granularity.as_deref() {
        Some(raw) => raw.parse::<Granularity>()?,
        None => Granularity::Daily,
    };
    let devices = state.repo.load().await?;
    let points = usage_series(&devices, granularity, Utc::now(), state.chart_offset);
    Ok(Json(SeriesResponse {
        granularity,
        points,
    }))
}

// =============================== PERMISSIONS =================================== //

#[derive(Debug, Serialize)]
pub struct PermissionResponse {
    pub feature: Feature,
    pub allowed: bool,
    pub identity_present: bool,
    #[serde(flatten)]
    pub outcome: GateOutcome,
}

pub async fn permission_handler(
    State(state): State<Arc<ServerState>>,
    Path(feature): Path<String>,
) -> Result<Json<PermissionResponse>, ApiError> {
    let feature: Feature = feature.parse()?;
    let check = state.gate.check(feature).await?;
    let outcome = GateOutcome::from_check(check, feature, state.gate.login_path());
    Ok(Json(PermissionResponse {
        feature,
        allowed: check.allowed,
        identity_present: check.identity_present,
        outcome,
    }))
}

#[derive(Debug, Serialize)]
pub struct AccessRequestResponse {
    pub request_id: String,
    pub feature: Feature,
}

pub async fn request_access_handler(
    State(state): State<Arc<ServerState>>,
    Path(feature): Path<String>,
) -> Result<(StatusCode, Json<AccessRequestResponse>), ApiError> {
    let feature: Feature = feature.parse()?;
    let Some(identity) = state.gate.identity().await? else {
        return Err(ApiError::Unauthenticated {
            to: state.gate.login_path().to_string(),
        });
    };

    let request = AccessRequest::new(&identity, feature, Utc::now());
    let response = AccessRequestResponse {
        request_id: request.id.clone(),
        feature,
    };
    state.access_requests.submit(request);

    Ok((StatusCode::ACCEPTED, Json(response)))
}

// =============================== SUGGESTIONS =================================== //

pub async fn suggestions_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<Vec<Suggestion>>, ApiError> {
    require(&state, Feature::Suggestions).await?;
    Ok(Json(state.notifier.current().await?))
}

pub async fn poll_suggestions_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<PollOutcome>, ApiError> {
    require(&state, Feature::Suggestions).await?;
    Ok(Json(state.notifier.poll_once().await?))
}

pub async fn alerts_handler(State(state): State<Arc<ServerState>>) -> Json<Vec<Alert>> {
    Json(state.notifier.alerts().list(Utc::now()))
}

pub async fn dismiss_alert_handler(
    State(state): State<Arc<ServerState>>,
    Path(alert_id): Path<String>,
) -> StatusCode {
    if state.notifier.alerts().dismiss(&alert_id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
