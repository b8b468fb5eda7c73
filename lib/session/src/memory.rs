//! In-memory session and user store.
//!
//! Backs the server binary with a static user database loaded from
//! configuration plus a session table filled by the login portal. Passwords
//! are stored as argon2 PHC strings.

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use gatehouse_core::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::SessionError;
use crate::identity::Identity;
use crate::provider::{Credential, SessionProvider};
use crate::session::{SessionId, UserSession};

/// Hashes a password into an argon2 PHC string.
///
/// # Errors
///
/// Returns an error if hashing fails.
pub fn hash_password(password: &str) -> Result<String, SessionError> {
    let salt = SaltString::generate(&mut OsRng);
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| SessionError::Hashing {
            reason: e.to_string(),
        })?;
    Ok(phc.to_string())
}

/// Hash verified against when the username is unknown or disabled, so the
/// lookup costs the same either way.
fn dummy_password_hash() -> Option<&'static str> {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    DUMMY
        .get_or_init(|| hash_password("gatehouse-dummy-password").ok())
        .as_deref()
}

/// A user entry in the static user database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// The account's identity.
    #[serde(flatten)]
    identity: Identity,
    /// Argon2 PHC string.
    password: String,
    /// Disabled accounts never authenticate and drop their sessions on refresh.
    #[serde(default)]
    disabled: bool,
}

impl UserRecord {
    /// Creates an enabled user record.
    #[must_use]
    pub fn new(identity: Identity, password_hash: impl Into<String>) -> Self {
        Self {
            identity,
            password: password_hash.into(),
            disabled: false,
        }
    }

    /// Marks the record disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Returns the account's identity.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns true if the account is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }
}

/// Session provider holding everything in process memory.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    users: RwLock<HashMap<String, UserRecord>>,
    sessions: RwLock<HashMap<SessionId, UserSession>>,
    tokens: RwLock<HashMap<String, String>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with a user database.
    #[must_use]
    pub fn with_users(users: impl IntoIterator<Item = UserRecord>) -> Self {
        let users = users
            .into_iter()
            .map(|record| (record.identity.username().to_string(), record))
            .collect();
        Self {
            users: RwLock::new(users),
            ..Self::default()
        }
    }

    /// Adds or replaces a user.
    pub async fn insert_user(&self, record: UserRecord) {
        let username = record.identity.username().to_string();
        self.users.write().await.insert(username, record);
    }

    /// Removes a user. Their sessions are dropped on the next refresh.
    pub async fn remove_user(&self, username: &str) -> Option<UserRecord> {
        self.users.write().await.remove(username)
    }

    /// Stores a session created by the login portal.
    pub async fn insert_session(&self, session: UserSession) {
        self.sessions
            .write()
            .await
            .insert(session.id().clone(), session);
    }

    /// Removes a session.
    pub async fn remove_session(&self, id: &SessionId) -> Option<UserSession> {
        self.sessions.write().await.remove(id)
    }

    /// Registers an opaque bearer token for `username`.
    pub async fn register_token(&self, token: impl Into<String>, username: impl Into<String>) {
        self.tokens
            .write()
            .await
            .insert(token.into(), username.into());
    }

    async fn active_identity(&self, username: &str) -> Option<Identity> {
        self.users
            .read()
            .await
            .get(username)
            .filter(|record| !record.disabled)
            .map(|record| record.identity.clone())
    }
}

#[async_trait]
impl SessionProvider for MemorySessionStore {
    async fn load_session_by_cookie(
        &self,
        id: &SessionId,
    ) -> Result<Option<UserSession>, SessionError> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    #[instrument(skip(self, identity), fields(username = identity.username()))]
    async fn refresh_identity(
        &self,
        session: &SessionId,
        identity: &Identity,
    ) -> Result<Option<Identity>, SessionError> {
        let Some(current) = self.active_identity(identity.username()).await else {
            debug!("account gone, dropping session");
            self.sessions.write().await.remove(session);
            return Ok(None);
        };

        if let Some(stored) = self.sessions.write().await.get_mut(session) {
            stored.refreshed(current.clone());
        }

        Ok(Some(current))
    }

    #[instrument(skip(self, credential), fields(scheme = %credential.scheme()))]
    async fn validate_credential(
        &self,
        credential: &Credential,
    ) -> Result<Option<Identity>, SessionError> {
        match credential {
            Credential::Basic { username, password } => {
                let stored = self
                    .users
                    .read()
                    .await
                    .get(username)
                    .filter(|record| !record.disabled)
                    .map(|record| (record.identity.clone(), record.password.clone()));

                let Some((identity, phc)) = stored else {
                    let dummy = dummy_password_hash().and_then(|h| PasswordHash::new(h).ok());
                    if let Some(dummy) = dummy {
                        let _ = Argon2::default().verify_password(password.as_bytes(), &dummy);
                    }
                    return Ok(None);
                };

                let parsed = PasswordHash::new(&phc).map_err(|e| SessionError::Corrupt {
                    key: username.clone(),
                    reason: e.to_string(),
                })?;

                if Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
                {
                    Ok(Some(identity))
                } else {
                    Ok(None)
                }
            }
            Credential::Bearer { token } => {
                let username = self.tokens.read().await.get(token).cloned();
                match username {
                    Some(username) => Ok(self.active_identity(&username).await),
                    None => Ok(None),
                }
            }
        }
    }
}
