//! Backend proxy tests against a throwaway upstream

use axum::body::{Body, Bytes};
use axum::extract::{Path, Query};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use tower::ServiceExt;

use crate::common::{get as get_req, send, spawn_upstream, unreachable_upstream, Hub};

fn backend() -> Router {
    Router::new()
        .route(
            "/reports/{id}",
            get(|Path(id): Path<String>, headers: HeaderMap| async move {
                if id == "missing" {
                    return (
                        StatusCode::NOT_FOUND,
                        Json(json!({ "detail": "Report not found" })),
                    )
                        .into_response();
                }
                let auth = headers
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                Json(json!({ "id": id, "auth": auth })).into_response()
            }),
        )
        .route(
            "/reports/{id}/download",
            get(|Path(id): Path<String>| async move {
                let mut headers = HeaderMap::new();
                headers.insert(header::CONTENT_TYPE, "application/pdf".parse().unwrap());
                if id == "named" {
                    headers.insert(
                        header::CONTENT_DISPOSITION,
                        "attachment; filename=\"march.pdf\"".parse().unwrap(),
                    );
                }
                (headers, Bytes::from_static(b"%PDF-1.4")).into_response()
            }),
        )
        .route(
            "/reports/create",
            post(
                |Query(query): Query<HashMap<String, String>>, Json(body): Json<Value>| async move {
                    Json(json!({ "user_id": query.get("user_id"), "echo": body }))
                },
            ),
        )
        .route(
            "/statistics/collect",
            post(|| async { Json(json!({ "collected": true })) }),
        )
        .route(
            "/weather",
            get(|Query(query): Query<HashMap<String, String>>| async move {
                match query.get("city").map(String::as_str) {
                    Some("Nowhere") => (
                        StatusCode::UNAUTHORIZED,
                        "bad key".to_string(),
                    )
                        .into_response(),
                    Some("Garbled") => "not json".into_response(),
                    _ => Json(json!({
                        "city": query.get("city"),
                        "units": query.get("units"),
                        "temperature": 21.5
                    }))
                    .into_response(),
                }
            }),
        )
}

#[tokio::test]
async fn test_report_forwards_session() {
    let hub = Hub::new(&spawn_upstream(backend()).await);
    hub.sign_in_user(&[]).await;

    let (status, body) = send(hub.router(), get_req("/api/reports?report_id=r42")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "id": "r42", "auth": "Bearer tok-123" }));
}

#[tokio::test]
async fn test_upstream_error_keeps_status() {
    let hub = Hub::new(&spawn_upstream(backend()).await);

    let (status, body) = send(hub.router(), get_req("/api/reports?report_id=missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body,
        json!({
            "error": "Backend error: 404 Not Found",
            "details": { "detail": "Report not found" }
        })
    );
}

#[tokio::test]
async fn test_missing_report_id_is_rejected() {
    let hub = Hub::new(&unreachable_upstream().await);

    let (status, body) = send(hub.router(), get_req("/api/reports")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("report_id"));
}

#[tokio::test]
async fn test_report_id_cannot_leave_reports_path() {
    let upstream = backend().route(
        "/users/{id}",
        get(|| async { Json(json!({ "secret": true })) }),
    );
    let hub = Hub::new(&spawn_upstream(upstream).await);
    hub.sign_in_user(&[]).await;

    for uri in [
        "/api/reports?report_id=../x",
        "/api/reports?report_id=..%2Fusers%2Fadmin",
        "/api/reports?report_id=a%3Fb%3D1",
        "/api/reports/download?report_id=../x",
        "/api/reports/download?report_id=a%3Fb%3D1",
    ] {
        let (status, body) = send(hub.router(), get_req(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error"], "Invalid parameter: report_id");
    }
}

#[tokio::test]
async fn test_unreachable_backend_is_internal_error() {
    let hub = Hub::new(&unreachable_upstream().await);

    let (status, body) = send(hub.router(), get_req("/api/reports?report_id=r1")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");
}

#[tokio::test]
async fn test_download_sets_attachment_headers() {
    let hub = Hub::new(&spawn_upstream(backend()).await);

    let response = hub
        .router()
        .oneshot(get_req("/api/reports/download?report_id=named"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"march.pdf\""
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"%PDF-1.4");

    let response = hub
        .router()
        .oneshot(get_req("/api/reports/download?report_id=r7"))
        .await
        .unwrap();
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"report-r7.pdf\""
    );
}

#[tokio::test]
async fn test_create_report_forwards_body_and_user() {
    let hub = Hub::new(&spawn_upstream(backend()).await);

    let request = Request::post("/api/reports/create?user_id=u9")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "period": "2026-03" }).to_string()))
        .unwrap();
    let (status, body) = send(hub.router(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "user_id": "u9", "echo": { "period": "2026-03" } }));

    let request = Request::post("/api/reports/create")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(hub.router(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_collect_statistics() {
    let hub = Hub::new(&spawn_upstream(backend()).await);

    let request = Request::post("/api/statistics/collect")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(hub.router(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["collected"], true);
}

#[tokio::test]
async fn test_weather_defaults_to_metric() {
    let hub = Hub::new(&spawn_upstream(backend()).await);

    let (status, body) = send(hub.router(), get_req("/api/weather?city=Lisbon")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["units"], "metric");
    assert_eq!(body["temperature"], 21.5);
}

#[tokio::test]
async fn test_weather_falls_back_when_unreachable() {
    let hub = Hub::new(&unreachable_upstream().await);

    let (status, body) =
        send(hub.router(), get_req("/api/weather?city=Oslo&units=imperial")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fallback"], true);
    assert_eq!(body["city"], "Oslo");
    assert_eq!(body["units"], "imperial");
}

#[tokio::test]
async fn test_weather_falls_back_on_malformed_reply() {
    let hub = Hub::new(&spawn_upstream(backend()).await);

    let (status, body) = send(hub.router(), get_req("/api/weather?city=Garbled")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fallback"], true);
}

#[tokio::test]
async fn test_weather_upstream_error_passes_through() {
    let hub = Hub::new(&spawn_upstream(backend()).await);

    let (status, body) = send(hub.router(), get_req("/api/weather?city=Nowhere")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["details"], "bad key");

    let (status, _) = send(hub.router(), get_req("/api/weather")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
