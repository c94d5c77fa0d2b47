//! Where suggestions come from

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::HubError;
use crate::http::client::BackendClient;
use crate::models::device::Device;
use crate::models::suggestion::Suggestion;
use crate::storage::session::load_session;
use crate::storage::store::Store;

/// Suggestion service seam
#[async_trait]
pub trait SuggestionSource: Send + Sync {
    /// Suggestions for the given device set
    async fn fetch(&self, devices: &[Device]) -> Result<Vec<Suggestion>, HubError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    devices: &'a [Device],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GenerateResponse {
    Wrapped { suggestions: Vec<Suggestion> },
    Bare(Vec<Suggestion>),
}

/// Asks the backend to generate suggestions for the device set
pub struct BackendSuggestionSource {
    client: Arc<BackendClient>,
    store: Arc<Store>,
}

impl BackendSuggestionSource {
    pub const PATH: &'static str = "/suggestions/generate";

    pub fn new(client: Arc<BackendClient>, store: Arc<Store>) -> Self {
        Self { client, store }
    }
}

#[async_trait]
impl SuggestionSource for BackendSuggestionSource {
    async fn fetch(&self, devices: &[Device]) -> Result<Vec<Suggestion>, HubError> {
        let session = load_session(&self.store).await?;
        let reply: serde_json::Value = self
            .client
            .post_json(Self::PATH, &GenerateRequest { devices }, session.as_ref())
            .await?;
        let response: GenerateResponse = serde_json::from_value(reply).map_err(|e| {
            HubError::SuggestionError(format!("unrecognised suggestion reply: {}", e))
        })?;

        Ok(match response {
            GenerateResponse::Wrapped { suggestions } => suggestions,
            GenerateResponse::Bare(suggestions) => suggestions,
        })
    }
}
