//! Shared test fixtures

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower::ServiceExt;

use homehub::app::options::AppOptions;
use homehub::app::state::AppState;
use homehub::http::client::BackendClient;
use homehub::models::identity::{Feature, Identity, Member, PermissionSet, User};
use homehub::permissions::access::AccessRequest;
use homehub::server::serve::router;
use homehub::storage::session::{save_identity, save_session, Session};
use homehub::storage::store::Store;

/// Serve `app` on an ephemeral local port and return its base URL
pub async fn spawn_upstream(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Base URL of a port nothing listens on
pub async fn unreachable_upstream() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub struct Hub {
    pub state: AppState,
    pub access_rx: mpsc::UnboundedReceiver<AccessRequest>,
}

impl Hub {
    pub fn new(backend_url: &str) -> Self {
        let options = AppOptions {
            backend_base_url: backend_url.to_string(),
            ..Default::default()
        };
        let backend = Arc::new(
            BackendClient::new(&options.backend_base_url, options.backend_timeout).unwrap(),
        );
        let (state, access_rx) =
            AppState::assemble(Arc::new(Store::in_memory()), backend, &options);
        Self { state, access_rx }
    }

    pub fn router(&self) -> Router {
        router(Arc::new(self.state.server_state()))
    }

    pub async fn sign_in_user(&self, features: &[Feature]) {
        let user = Identity::User(User {
            id: "u1".to_string(),
            username: "alex".to_string(),
            email: None,
            role: Some("owner".to_string()),
            permissions: PermissionSet::granting(features),
        });
        save_identity(&self.state.store, &user).await.unwrap();
        save_session(&self.state.store, &Session::new("tok-123", "Bearer"))
            .await
            .unwrap();
    }

    pub async fn sign_in_member(&self, features: &[Feature]) {
        let member = Identity::Member(Member {
            id: "m1".to_string(),
            name: "Robin".to_string(),
            relation: Some("child".to_string()),
            permissions: PermissionSet::granting(features),
        });
        save_identity(&self.state.store, &member).await.unwrap();
    }
}

/// Drive one request through `app` and decode the JSON reply
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}
