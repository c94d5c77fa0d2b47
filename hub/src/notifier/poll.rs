//! Suggestion novelty polling

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::errors::HubError;
use crate::models::suggestion::Suggestion;
use crate::notifier::alerts::Alerts;
use crate::notifier::source::SuggestionSource;
use crate::storage::devices::DeviceRepo;
use crate::storage::store::{Store, StoreKey};

/// Result of a single poll
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PollOutcome {
    /// No devices, so nothing was asked
    Skipped,
    /// Another poll was already running
    Busy,
    /// The source was consulted and the seen set persisted
    Checked { fresh: Vec<Suggestion>, total: usize },
}

pub struct SuggestionNotifier {
    repo: Arc<DeviceRepo>,
    store: Arc<Store>,
    source: Arc<dyn SuggestionSource>,
    alerts: Arc<Alerts>,
    in_flight: Mutex<()>,
}

impl SuggestionNotifier {
    pub fn new(
        repo: Arc<DeviceRepo>,
        store: Arc<Store>,
        source: Arc<dyn SuggestionSource>,
        alerts: Arc<Alerts>,
    ) -> Self {
        Self {
            repo,
            store,
            source,
            alerts,
            in_flight: Mutex::new(()),
        }
    }

    pub fn alerts(&self) -> &Arc<Alerts> {
        &self.alerts
    }

    /// The last persisted suggestion set
    pub async fn current(&self) -> Result<Vec<Suggestion>, HubError> {
        self.store.get_or_default(StoreKey::Suggestions).await
    }

    /// Fetch, diff against the persisted set, alert on novel entries and
    /// persist the fetched set.
    ///
    /// At most one poll runs at a time; a failed fetch persists nothing.
    pub async fn poll_once(&self) -> Result<PollOutcome, HubError> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("Suggestion poll already in flight, skipping");
            return Ok(PollOutcome::Busy);
        };

        let devices = self.repo.load().await?;
        if devices.is_empty() {
            debug!("No devices, skipping suggestion poll");
            return Ok(PollOutcome::Skipped);
        }

        let fetched = self.source.fetch(&devices).await?;
        let previous: Vec<Suggestion> = self.current().await?;

        let mut seen: HashSet<String> = previous.iter().map(|s| s.fingerprint()).collect();
        let fresh: Vec<Suggestion> = fetched
            .iter()
            .filter(|s| seen.insert(s.fingerprint()))
            .cloned()
            .collect();

        let now = Utc::now();
        for suggestion in &fresh {
            self.alerts.raise_for(suggestion, now);
        }

        self.store.put(StoreKey::Suggestions, &fetched).await?;

        if !fresh.is_empty() {
            info!(
                fresh = fresh.len(),
                total = fetched.len(),
                "New energy-saving suggestions"
            );
        }

        Ok(PollOutcome::Checked {
            fresh,
            total: fetched.len(),
        })
    }
}
