//! Local API tests: gating, devices, energy and suggestions

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use homehub::models::device::{Device, DeviceType};
use homehub::models::identity::Feature;
use homehub::models::room::Room;
use homehub::storage::session::load_session;

use crate::common::{get, post_json, send, spawn_upstream, unreachable_upstream, Hub};

#[tokio::test]
async fn test_health_is_ungated() {
    let hub = Hub::new(&unreachable_upstream().await);
    let (status, body) = send(hub.router(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_no_identity_redirects_to_login() {
    let hub = Hub::new(&unreachable_upstream().await);
    let (status, body) = send(hub.router(), get("/devices")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "outcome": "redirect_to_login", "to": "/login" }));
}

#[tokio::test]
async fn test_member_without_grant_is_denied() {
    let hub = Hub::new(&unreachable_upstream().await);
    hub.sign_in_member(&[Feature::Devices]).await;

    let (status, body) = send(hub.router(), get("/energy/summary")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["outcome"], "denied");
    assert_eq!(body["notice"]["feature"], "energy");
    assert_eq!(body["notice"]["can_request_access"], true);

    let (status, _) = send(hub.router(), get("/devices")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_permission_check_endpoint() {
    let hub = Hub::new(&unreachable_upstream().await);
    hub.sign_in_user(&[Feature::Reports]).await;

    let (status, body) = send(hub.router(), get("/permissions/reports")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed"], true);
    assert_eq!(body["outcome"], "allowed");

    let (_, body) = send(hub.router(), get("/permissions/weather")).await;
    assert_eq!(body["allowed"], false);
    assert_eq!(body["identity_present"], true);

    let (status, _) = send(hub.router(), get("/permissions/garage")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_request_access_is_forwarded() {
    let mut hub = Hub::new(&unreachable_upstream().await);
    hub.sign_in_member(&[]).await;

    let request = Request::post("/permissions/energy/request-access")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(hub.router(), request).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let queued = hub.access_rx.recv().await.unwrap();
    assert_eq!(queued.id, body["request_id"].as_str().unwrap());
    assert_eq!(queued.feature, Feature::Energy);
    assert_eq!(queued.identity_kind, "member");
}

#[tokio::test]
async fn test_toggle_and_patch_device() {
    let hub = Hub::new(&unreachable_upstream().await);
    hub.sign_in_user(&[Feature::Devices]).await;
    hub.state
        .repo
        .register(Device::new("fan-1", "Ceiling fan", DeviceType::Fan, "Bedroom", 75.0))
        .await
        .unwrap();

    let toggle = Request::post("/devices/fan-1/toggle")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(hub.router(), toggle).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "on");
    assert_eq!(body["usageHistory"].as_array().unwrap().len(), 1);

    let patch = Request::patch("/devices/fan-1")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "speed": 3 }).to_string()))
        .unwrap();
    let (status, body) = send(hub.router(), patch).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["speed"], 3);

    let missing = Request::post("/devices/nope/toggle")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(hub.router(), missing).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_room_rename_moves_devices() {
    let hub = Hub::new(&unreachable_upstream().await);
    hub.sign_in_user(&[Feature::Rooms, Feature::Energy]).await;
    hub.state
        .repo
        .save_rooms(&[Room {
            id: "r1".to_string(),
            name: "Den".to_string(),
            image: None,
        }])
        .await
        .unwrap();
    let mut lamp = Device::new("l1", "Lamp", DeviceType::Light, "Den", 0.0);
    lamp.total_energy_consumed = 1.5;
    hub.state.repo.register(lamp).await.unwrap();

    let (status, body) = send(
        hub.router(),
        post_json("/rooms/Den/rename", json!({ "name": "Study" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["devices_moved"], 1);

    let (_, body) = send(hub.router(), get("/energy/rooms/Study")).await;
    assert_eq!(body["energy"], 1.5);
    let (_, body) = send(hub.router(), get("/energy/rooms/Den")).await;
    assert_eq!(body["energy"], 0.0);
}

#[tokio::test]
async fn test_energy_summary_adds_up() {
    let hub = Hub::new(&unreachable_upstream().await);
    hub.sign_in_user(&[Feature::Energy]).await;
    for (id, room, kwh) in [("a", "Kitchen", 1.25), ("b", "Kitchen", 0.5), ("c", "Office", 2.0)] {
        let mut device = Device::new(id, id, DeviceType::Other, room, 0.0);
        device.total_energy_consumed = kwh;
        hub.state.repo.register(device).await.unwrap();
    }

    let (status, body) = send(hub.router(), get("/energy/summary")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3.75);
    let rooms: f64 = body["rooms"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["energy"].as_f64().unwrap())
        .sum();
    assert_eq!(rooms, 3.75);
    assert_eq!(body["devices"][0]["device_id"], "c");
}

#[tokio::test]
async fn test_energy_series_granularity() {
    let hub = Hub::new(&unreachable_upstream().await);
    hub.sign_in_user(&[Feature::Energy]).await;

    let (_, body) = send(hub.router(), get("/energy/series")).await;
    assert_eq!(body["granularity"], "daily");
    assert_eq!(body["points"].as_array().unwrap().len(), 24);

    let (_, body) = send(hub.router(), get("/energy/series?granularity=monthly")).await;
    assert_eq!(body["points"].as_array().unwrap().len(), 30);

    let (status, _) = send(hub.router(), get("/energy/series?granularity=hourly")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

async fn suggestions_backend() -> String {
    let app = Router::new().route(
        "/suggestions/generate",
        post(|Json(body): Json<Value>| async move {
            let device_id = body["devices"][0]["id"].clone();
            Json(json!({
                "suggestions": [{
                    "title": "Lower the thermostat",
                    "description": "Two degrees saves about 10%",
                    "category": "heating",
                    "deviceId": device_id
                }]
            }))
        }),
    );
    spawn_upstream(app).await
}

#[tokio::test]
async fn test_poll_raises_alert_once() {
    let hub = Hub::new(&suggestions_backend().await);
    hub.sign_in_user(&[Feature::Suggestions]).await;
    hub.state
        .repo
        .register(Device::new("t1", "Thermostat", DeviceType::Thermostat, "Hall", 20.0))
        .await
        .unwrap();

    let poll = || Request::post("/suggestions/poll").body(Body::empty()).unwrap();
    let (status, body) = send(hub.router(), poll()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "checked");
    assert_eq!(body["fresh"].as_array().unwrap().len(), 1);
    assert_eq!(body["fresh"][0]["deviceId"], "t1");

    let (_, body) = send(hub.router(), poll()).await;
    assert!(body["fresh"].as_array().unwrap().is_empty());

    let (_, alerts) = send(hub.router(), get("/alerts")).await;
    let alerts = alerts.as_array().unwrap();
    assert_eq!(alerts.len(), 1);

    let dismiss = Request::post(format!("/alerts/{}/dismiss", alerts[0]["id"].as_str().unwrap()))
        .body(Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(hub.router(), dismiss).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (_, stored) = send(hub.router(), get("/suggestions")).await;
    assert_eq!(stored.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_poll_failure_is_reported() {
    let hub = Hub::new(&unreachable_upstream().await);
    hub.sign_in_user(&[Feature::Suggestions]).await;
    hub.state
        .repo
        .register(Device::new("t1", "Thermostat", DeviceType::Thermostat, "Hall", 20.0))
        .await
        .unwrap();

    let poll = Request::post("/suggestions/poll").body(Body::empty()).unwrap();
    let (status, _) = send(hub.router(), poll).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (_, stored) = send(hub.router(), get("/suggestions")).await;
    assert!(stored.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unrecognised_suggestion_reply_is_rejected() {
    let app = Router::new().route(
        "/suggestions/generate",
        post(|| async { Json(json!({ "unexpected": 1 })) }),
    );
    let hub = Hub::new(&spawn_upstream(app).await);
    hub.sign_in_user(&[Feature::Suggestions]).await;
    hub.state
        .repo
        .register(Device::new("t1", "Thermostat", DeviceType::Thermostat, "Hall", 20.0))
        .await
        .unwrap();

    let poll = Request::post("/suggestions/poll").body(Body::empty()).unwrap();
    let (status, body) = send(hub.router(), poll).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().starts_with("Suggestion error"));

    let (_, stored) = send(hub.router(), get("/suggestions")).await;
    assert!(stored.as_array().unwrap().is_empty());
    let (_, alerts) = send(hub.router(), get("/alerts")).await;
    assert!(alerts.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_sign_in_and_out() {
    let hub = Hub::new(&unreachable_upstream().await);

    let sign_in = json!({
        "member": {
            "id": "m7",
            "name": "Jo",
            "permissions": { "devices": true }
        },
        "access_token": "abc"
    });
    let (status, body) = send(hub.router(), post_json("/session", sign_in)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "id": "m7", "kind": "member" }));

    let device = json!({
        "id": "tv-1",
        "name": "Television",
        "type": "tv",
        "room": "Living",
        "powerConsumption": 110.0
    });
    let (status, _) = send(hub.router(), post_json("/devices", device.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(hub.router(), post_json("/devices", device)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let with_history = json!({
        "id": "lamp-9",
        "name": "Lamp",
        "type": "light",
        "room": "Living",
        "status": "on",
        "usageHistory": [{ "startTime": i64::MIN, "powerConsumption": 60.0 }]
    });
    let (status, _) = send(hub.router(), post_json("/devices", with_history)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, devices) = send(hub.router(), get("/devices")).await;
    assert_eq!(devices.as_array().map(Vec::len), Some(1));

    // a tokenless sign-in must not inherit the previous identity's token
    assert!(load_session(&hub.state.store).await.unwrap().is_some());
    let tokenless = json!({
        "user": {
            "id": "u9",
            "username": "kim",
            "permissions": { "devices": true }
        }
    });
    let (status, body) = send(hub.router(), post_json("/session", tokenless)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "id": "u9", "kind": "user" }));
    assert!(load_session(&hub.state.store).await.unwrap().is_none());

    let sign_out = Request::delete("/session").body(Body::empty()).unwrap();
    let (status, _) = send(hub.router(), sign_out).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(hub.router(), get("/devices")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sign_in_needs_exactly_one_identity() {
    let hub = Hub::new(&unreachable_upstream().await);
    let (status, _) = send(hub.router(), post_json("/session", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
