//! Identities and the permission sets attached to them

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::HubError;

/// A guarded feature of the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Feature {
    Dashboard,
    Devices,
    Rooms,
    Energy,
    Reports,
    Statistics,
    Members,
    Settings,
    Suggestions,
    Weather,
}

impl Feature {
    pub const ALL: [Feature; 10] = [
        Feature::Dashboard,
        Feature::Devices,
        Feature::Rooms,
        Feature::Energy,
        Feature::Reports,
        Feature::Statistics,
        Feature::Members,
        Feature::Settings,
        Feature::Suggestions,
        Feature::Weather,
    ];

    /// Key used in persisted permission maps
    pub fn key(&self) -> &'static str {
        match self {
            Feature::Dashboard => "dashboard",
            Feature::Devices => "devices",
            Feature::Rooms => "rooms",
            Feature::Energy => "energy",
            Feature::Reports => "reports",
            Feature::Statistics => "statistics",
            Feature::Members => "members",
            Feature::Settings => "settings",
            Feature::Suggestions => "suggestions",
            Feature::Weather => "weather",
        }
    }

    /// Name shown to people in denial notices
    pub fn label(&self) -> &'static str {
        match self {
            Feature::Dashboard => "Dashboard",
            Feature::Devices => "Devices",
            Feature::Rooms => "Rooms",
            Feature::Energy => "Energy usage",
            Feature::Reports => "Reports",
            Feature::Statistics => "Statistics",
            Feature::Members => "Household members",
            Feature::Settings => "Settings",
            Feature::Suggestions => "Energy-saving suggestions",
            Feature::Weather => "Weather",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Feature {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .iter()
            .copied()
            .find(|f| f.key() == s)
            .ok_or_else(|| HubError::ValidationError(format!("unknown feature key: {}", s)))
    }
}

impl Serialize for Feature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

impl<'de> Deserialize<'de> for Feature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Mapping from feature to grant.
///
/// Parsing rejects unknown feature keys; any non-boolean grant is stored as
/// `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet {
    grants: BTreeMap<Feature, bool>,
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set granting exactly the given features
    pub fn granting(features: &[Feature]) -> Self {
        Self {
            grants: features.iter().map(|f| (*f, true)).collect(),
        }
    }

    pub fn with(mut self, feature: Feature, granted: bool) -> Self {
        self.grants.insert(feature, granted);
        self
    }

    /// Parse a raw JSON object of `feature-key -> value`
    pub fn from_raw(raw: &serde_json::Map<String, serde_json::Value>) -> Result<Self, HubError> {
        let mut grants = BTreeMap::new();
        for (key, value) in raw {
            let feature: Feature = key.parse()?;
            grants.insert(feature, value.as_bool() == Some(true));
        }
        Ok(Self { grants })
    }

    /// True only for an explicit `true` grant
    pub fn allows(&self, feature: Feature) -> bool {
        self.grants.get(&feature).copied().unwrap_or(false)
    }

    pub fn granted(&self) -> impl Iterator<Item = Feature> + '_ {
        self.grants.iter().filter(|(_, g)| **g).map(|(f, _)| *f)
    }
}

impl Serialize for PermissionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.grants.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PermissionSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
        PermissionSet::from_raw(&raw).map_err(serde::de::Error::custom)
    }
}

/// Admin-style account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub permissions: PermissionSet,
}

/// Household member attached to a user's home
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    #[serde(default)]
    pub permissions: PermissionSet,
}

/// The active identity permissions are checked against
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    User(User),
    Member(Member),
}

impl Identity {
    pub fn id(&self) -> &str {
        match self {
            Identity::User(u) => &u.id,
            Identity::Member(m) => &m.id,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Identity::User(u) => &u.username,
            Identity::Member(m) => &m.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Identity::User(_) => "user",
            Identity::Member(_) => "member",
        }
    }

    pub fn permissions(&self) -> &PermissionSet {
        match self {
            Identity::User(u) => &u.permissions,
            Identity::Member(m) => &m.permissions,
        }
    }
}
