//! HTTP client implementation

use std::time::Duration;

use axum::body::Bytes;
use reqwest::header::{self, HeaderMap};
use reqwest::{Body, Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};
use url::Url;

use crate::errors::HubError;
use crate::storage::session::Session;

/// Raw upstream reply, success or not
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn header_str(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// HTTP client for backend communication
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, HubError> {
        // Reject malformed base URLs up front
        Url::parse(base_url)?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute upstream URL for `path` with query pairs appended
    pub fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, HubError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Send a request and return the upstream reply regardless of status.
    ///
    /// Only transport failures are errors here.
    pub async fn forward(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Bytes>,
        session: Option<&Session>,
    ) -> Result<UpstreamResponse, HubError> {
        let url = self.url(path, query)?;
        debug!("{} {}", method, url);

        let mut request = self.client.request(method, url);
        if let Some(session) = session {
            request = request.header(header::AUTHORIZATION, session.authorization_header());
        }
        if let Some(body) = body.filter(|b| !b.is_empty()) {
            request = request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body));
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }

    /// POST a JSON body and decode a JSON reply; non-2xx is an error
    pub async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        session: Option<&Session>,
    ) -> Result<T, HubError> {
        let body = Bytes::from(serde_json::to_vec(body)?);
        let response = self
            .forward(Method::POST, path, &[], Some(body), session)
            .await?;

        if !response.is_success() {
            let text = response.text();
            error!("HTTP POST {} failed: {} - {}", path, response.status, text);
            return Err(HubError::UpstreamError {
                status: response.status.as_u16(),
                body: text,
            });
        }

        Ok(serde_json::from_slice(&response.body)?)
    }
}
