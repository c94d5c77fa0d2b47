//! One-time, dismissable alerts

use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::suggestion::Suggestion;
use crate::utils::generate_uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<Suggestion>,
    pub raised_at: DateTime<Utc>,
    /// When the alert dismisses itself; `None` keeps it until dismissed
    pub expires_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Live alerts kept at once; the oldest are dropped first
pub const MAX_ALERTS: usize = 50;

/// In-memory alert registry
pub struct Alerts {
    entries: RwLock<Vec<Alert>>,
    ttl: Option<Duration>,
}

impl Alerts {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            ttl,
        }
    }

    /// Raise an alert announcing a newly seen suggestion
    pub fn raise_for(&self, suggestion: &Suggestion, now: DateTime<Utc>) -> Alert {
        let alert = Alert {
            id: generate_uuid(),
            title: format!("New energy-saving suggestion: {}", suggestion.title),
            message: suggestion.description.clone(),
            suggestion: Some(suggestion.clone()),
            raised_at: now,
            expires_at: self.ttl.map(|ttl| now + ttl),
        };
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.push(alert.clone());
        if entries.len() > MAX_ALERTS {
            let excess = entries.len() - MAX_ALERTS;
            entries.drain(..excess);
        }
        alert
    }

    /// Live alerts, oldest first; expired ones are dropped
    pub fn list(&self, now: DateTime<Utc>) -> Vec<Alert> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.retain(|a| !a.is_expired(now));
        entries.clone()
    }

    /// Dismiss an alert; returns whether it was live
    pub fn dismiss(&self, alert_id: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|a| a.id != alert_id);
        entries.len() != before
    }

    /// Drop every alert
    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }
}
