//! Room grouping records

use serde::{Deserialize, Serialize};

/// A named grouping of devices.
///
/// Devices reference rooms by `name`, not `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}
