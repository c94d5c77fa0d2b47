//! Energy-saving suggestions produced by the suggestion service

use serde::{Deserialize, Serialize};

use crate::utils::sha256_hash;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub icon_color: String,
    /// Human-readable saving estimate, e.g. "~12 kWh / month"
    #[serde(default)]
    pub saving: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default)]
    pub details: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub device_id: String,
}

impl Suggestion {
    /// Stable identity used for novelty detection.
    ///
    /// Only the device, category and title participate so reworded
    /// descriptions do not re-raise a suggestion.
    pub fn fingerprint(&self) -> String {
        let key = format!("{}\u{1f}{}\u{1f}{}", self.device_id, self.category, self.title);
        sha256_hash(key.as_bytes())
    }
}
