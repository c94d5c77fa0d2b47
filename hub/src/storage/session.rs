//! Session state: the resident identity and backend credentials

use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use crate::errors::HubError;
use crate::models::identity::{Identity, Member, User};
use crate::storage::store::{Store, StoreKey};

/// Backend credentials
#[derive(Debug)]
pub struct Session {
    pub access_token: SecretString,
    pub token_type: String,
}

impl Session {
    pub fn new(access_token: impl Into<String>, token_type: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            token_type: token_type.into(),
        }
    }

    /// Value for the `Authorization` header
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token.expose_secret())
    }
}

/// Load backend credentials; the token type defaults to `Bearer`
pub async fn load_session(store: &Store) -> Result<Option<Session>, HubError> {
    let Some(token) = store.get::<String>(StoreKey::AccessToken).await? else {
        return Ok(None);
    };
    if token.is_empty() {
        return Ok(None);
    }
    let token_type = store
        .get::<String>(StoreKey::TokenType)
        .await?
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Bearer".to_string());
    Ok(Some(Session::new(token, token_type)))
}

pub async fn save_session(store: &Store, session: &Session) -> Result<(), HubError> {
    store
        .put(
            StoreKey::AccessToken,
            &session.access_token.expose_secret().to_string(),
        )
        .await?;
    store.put(StoreKey::TokenType, &session.token_type).await
}

/// Load the resident identity.
///
/// Exactly one of user or member should be stored; if both are, the user
/// wins.
pub async fn load_identity(store: &Store) -> Result<Option<Identity>, HubError> {
    let user = store.get::<User>(StoreKey::CurrentUser).await?;
    let member = store.get::<Member>(StoreKey::CurrentMember).await?;

    match (user, member) {
        (Some(user), Some(member)) => {
            warn!(
                user_id = %user.id,
                member_id = %member.id,
                "Both a user and a member are resident, using the user"
            );
            Ok(Some(Identity::User(user)))
        }
        (Some(user), None) => Ok(Some(Identity::User(user))),
        (None, Some(member)) => Ok(Some(Identity::Member(member))),
        (None, None) => Ok(None),
    }
}

/// Make `identity` the only resident identity
pub async fn save_identity(store: &Store, identity: &Identity) -> Result<(), HubError> {
    match identity {
        Identity::User(user) => {
            store.remove(StoreKey::CurrentMember).await?;
            store.put(StoreKey::CurrentUser, user).await
        }
        Identity::Member(member) => {
            store.remove(StoreKey::CurrentUser).await?;
            store.put(StoreKey::CurrentMember, member).await
        }
    }
}

/// Forget backend credentials but keep the resident identity
pub async fn clear_credentials(store: &Store) -> Result<(), HubError> {
    store.remove(StoreKey::AccessToken).await?;
    store.remove(StoreKey::TokenType).await
}

/// Forget identity and credentials
pub async fn clear_session(store: &Store) -> Result<(), HubError> {
    info!("Clearing session");
    store.remove(StoreKey::CurrentUser).await?;
    store.remove(StoreKey::CurrentMember).await?;
    clear_credentials(store).await
}
