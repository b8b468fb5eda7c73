//! Sessions bound to the session cookie.
//!
//! A session is created by the login portal after the user authenticates and
//! is looked up by the engine on every request that carries the session cookie.
//! The engine only reads sessions; the collaborator owns their lifecycle.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::Identity;
use crate::level::AuthenticationLevel;

/// Unique identifier for a session.
///
/// Session IDs are the opaque values carried in the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new session ID from a string.
    #[must_use]
    pub fn new(id: String) -> Self {
        Self(id)
    }

    /// Returns the session ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A stored user session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    /// Unique identifier for this session.
    id: SessionId,
    /// The account the session belongs to.
    identity: Identity,
    /// The level reached when the session was established.
    level: AuthenticationLevel,
    /// When the session was created.
    created_at: DateTime<Utc>,
    /// When the session expires.
    expires_at: DateTime<Utc>,
    /// When the identity was last re-read from the account backend.
    last_refreshed_at: DateTime<Utc>,
}

impl UserSession {
    /// Creates a new session valid for `duration`.
    #[must_use]
    pub fn new(
        id: SessionId,
        identity: Identity,
        level: AuthenticationLevel,
        duration: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            identity,
            level,
            created_at: now,
            expires_at: now + duration,
            last_refreshed_at: now,
        }
    }

    /// Overrides the last refresh timestamp.
    ///
    /// Used when reconstituting a session from storage.
    #[must_use]
    pub fn with_last_refreshed_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_refreshed_at = at;
        self
    }

    /// Returns the session ID.
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Returns the session's identity.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns the authentication level of the session.
    #[must_use]
    pub fn level(&self) -> AuthenticationLevel {
        self.level
    }

    /// Returns when the session was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the session expires.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns when the identity was last refreshed.
    #[must_use]
    pub fn last_refreshed_at(&self) -> DateTime<Utc> {
        self.last_refreshed_at
    }

    /// Returns true if the session has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Returns true if the session never completed a login.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        !self.level.is_authenticated()
    }

    /// Replaces the identity after a refresh and records the refresh time.
    pub fn refreshed(&mut self, identity: Identity) {
        self.identity = identity;
        self.last_refreshed_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_session_id() -> SessionId {
        SessionId::new("sess_test_123".to_string())
    }

    #[test]
    fn session_id_display() {
        let id = test_session_id();
        assert_eq!(id.to_string(), "sess_test_123");
    }

    #[test]
    fn session_id_from_str() {
        let id: SessionId = "test_session".into();
        assert_eq!(id.as_str(), "test_session");
    }

    #[test]
    fn new_session_has_correct_fields() {
        let before = Utc::now();
        let session = UserSession::new(
            test_session_id(),
            Identity::new("john"),
            AuthenticationLevel::OneFactor,
            Duration::hours(1),
        );
        let after = Utc::now();

        assert_eq!(session.id(), &test_session_id());
        assert_eq!(session.identity().username(), "john");
        assert_eq!(session.level(), AuthenticationLevel::OneFactor);
        assert!(session.created_at() >= before);
        assert!(session.created_at() <= after);
        assert_eq!(session.last_refreshed_at(), session.created_at());
        assert!(!session.is_expired());
        assert!(!session.is_anonymous());
    }

    #[test]
    fn session_expiration() {
        let session = UserSession::new(
            test_session_id(),
            Identity::new("john"),
            AuthenticationLevel::OneFactor,
            Duration::seconds(-1),
        );
        assert!(session.is_expired());
    }

    #[test]
    fn not_authenticated_session_is_anonymous() {
        let session = UserSession::new(
            test_session_id(),
            Identity::new(""),
            AuthenticationLevel::NotAuthenticated,
            Duration::hours(1),
        );
        assert!(session.is_anonymous());
    }

    #[test]
    fn refresh_replaces_identity_and_timestamp() {
        let stale = Utc::now() - Duration::hours(3);
        let mut session = UserSession::new(
            test_session_id(),
            Identity::new("john"),
            AuthenticationLevel::TwoFactor,
            Duration::hours(8),
        )
        .with_last_refreshed_at(stale);

        session.refreshed(Identity::new("john").with_groups(vec!["admins".to_string()]));

        assert!(session.identity().in_group("admins"));
        assert!(session.last_refreshed_at() > stale);
    }

    #[test]
    fn session_serialization_roundtrip() {
        let session = UserSession::new(
            test_session_id(),
            Identity::new("john").with_emails(vec!["john@example.com".to_string()]),
            AuthenticationLevel::TwoFactor,
            Duration::hours(1),
        );

        let json = serde_json::to_string(&session).expect("serialize");
        let parsed: UserSession = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(session, parsed);
    }
}
