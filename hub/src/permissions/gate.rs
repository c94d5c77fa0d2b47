//! Permission gate
//!
//! A pure check over the resident identity. Missing identity and missing
//! permission are distinct outcomes: the first redirects to login, the
//! second yields a dismissable notice.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::errors::HubError;
use crate::models::identity::{Feature, Identity};
use crate::storage::session::load_identity;
use crate::storage::store::Store;

/// Default login entry point for redirects
pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PermissionCheck {
    pub allowed: bool,
    pub identity_present: bool,
}

/// Fail-closed permission check: only an explicit `true` grant allows
pub fn check_permission(identity: Option<&Identity>, feature: Feature) -> PermissionCheck {
    match identity {
        None => PermissionCheck {
            allowed: false,
            identity_present: false,
        },
        Some(identity) => PermissionCheck {
            allowed: identity.permissions().allows(feature),
            identity_present: true,
        },
    }
}

/// Notice surfaced when a present identity lacks a permission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DenialNotice {
    pub feature: Feature,
    pub message: String,
    pub dismissable: bool,
    /// Whether a "request access" action should be offered
    pub can_request_access: bool,
}

impl DenialNotice {
    pub fn for_feature(feature: Feature) -> Self {
        Self {
            feature,
            message: format!("You don't have permission to access {}.", feature.label()),
            dismissable: true,
            can_request_access: true,
        }
    }
}

/// What the caller must do after a check
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GateOutcome {
    Allowed,
    Denied { notice: DenialNotice },
    RedirectToLogin { to: String },
}

impl GateOutcome {
    pub fn from_check(check: PermissionCheck, feature: Feature, login_path: &str) -> Self {
        match check {
            PermissionCheck {
                identity_present: false,
                ..
            } => GateOutcome::RedirectToLogin {
                to: login_path.to_string(),
            },
            PermissionCheck { allowed: true, .. } => GateOutcome::Allowed,
            PermissionCheck { allowed: false, .. } => GateOutcome::Denied {
                notice: DenialNotice::for_feature(feature),
            },
        }
    }
}

/// Gate bound to the store holding the resident identity
pub struct PermissionGate {
    store: Arc<Store>,
    login_path: String,
}

impl PermissionGate {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            login_path: LOGIN_PATH.to_string(),
        }
    }

    pub fn with_login_path(mut self, login_path: impl Into<String>) -> Self {
        self.login_path = login_path.into();
        self
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub async fn identity(&self) -> Result<Option<Identity>, HubError> {
        load_identity(&self.store).await
    }

    pub async fn check(&self, feature: Feature) -> Result<PermissionCheck, HubError> {
        let identity = self.identity().await?;
        let check = check_permission(identity.as_ref(), feature);
        debug!(
            feature = %feature,
            allowed = check.allowed,
            identity_present = check.identity_present,
            "Permission check"
        );
        Ok(check)
    }

    pub async fn guard(&self, feature: Feature) -> Result<GateOutcome, HubError> {
        let check = self.check(feature).await?;
        Ok(GateOutcome::from_check(check, feature, &self.login_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::identity::{Member, PermissionSet, User};
    use crate::storage::session::save_identity;

    fn member(permissions: PermissionSet) -> Identity {
        Identity::Member(Member {
            id: "m1".to_string(),
            name: "Sam".to_string(),
            relation: None,
            permissions,
        })
    }

    #[test]
    fn test_absent_key_is_denied() {
        let identity = member(PermissionSet::granting(&[Feature::Devices]));
        for feature in Feature::ALL {
            let check = check_permission(Some(&identity), feature);
            assert!(check.identity_present);
            assert_eq!(check.allowed, feature == Feature::Devices);
        }
    }

    #[test]
    fn test_no_identity_redirects() {
        let check = check_permission(None, Feature::Energy);
        assert_eq!(
            check,
            PermissionCheck {
                allowed: false,
                identity_present: false
            }
        );
        assert_eq!(
            GateOutcome::from_check(check, Feature::Energy, LOGIN_PATH),
            GateOutcome::RedirectToLogin {
                to: "/login".to_string()
            }
        );
    }

    #[test]
    fn test_admin_without_grant_is_denied() {
        let admin = Identity::User(User {
            id: "u1".to_string(),
            username: "root".to_string(),
            email: None,
            role: Some("admin".to_string()),
            permissions: PermissionSet::new().with(Feature::Reports, false),
        });
        let outcome = GateOutcome::from_check(
            check_permission(Some(&admin), Feature::Reports),
            Feature::Reports,
            LOGIN_PATH,
        );
        match outcome {
            GateOutcome::Denied { notice } => {
                assert!(notice.dismissable);
                assert!(notice.message.contains("Reports"));
            }
            other => panic!("expected denial, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_gate_reads_resident_identity() {
        let store = Arc::new(Store::in_memory());
        let gate = PermissionGate::new(store.clone()).with_login_path("/signin");

        assert_eq!(
            gate.guard(Feature::Energy).await.unwrap(),
            GateOutcome::RedirectToLogin {
                to: "/signin".to_string()
            }
        );

        save_identity(&store, &member(PermissionSet::granting(&[Feature::Energy])))
            .await
            .unwrap();
        assert_eq!(gate.guard(Feature::Energy).await.unwrap(), GateOutcome::Allowed);
    }

    #[test]
    fn test_outcome_serializes_with_tag() {
        let value = serde_json::to_value(GateOutcome::Allowed).unwrap();
        assert_eq!(value, serde_json::json!({"outcome": "allowed"}));
    }
}
