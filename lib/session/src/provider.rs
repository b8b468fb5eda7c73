//! The session/credential collaborator contract.
//!
//! The authorization engine never touches storage directly. Everything it
//! needs to know about sessions and accounts goes through [`SessionProvider`].
//! Implementations own their concurrency discipline (pooling, transactions,
//! caching); the engine calls each method at most once per strategy attempt.

use async_trait::async_trait;
use gatehouse_core::Result;
use std::fmt;

use crate::error::SessionError;
use crate::identity::Identity;
use crate::session::{SessionId, UserSession};

/// Authentication scheme of a header credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialScheme {
    /// RFC 7617 Basic.
    Basic,
    /// RFC 6750 Bearer.
    Bearer,
}

impl CredentialScheme {
    /// Returns the scheme name as it appears in headers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "Basic",
            Self::Bearer => "Bearer",
        }
    }
}

impl fmt::Display for CredentialScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded header credential.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Username and password from a Basic header.
    Basic { username: String, password: String },
    /// An opaque bearer token.
    Bearer { token: String },
}

impl Credential {
    /// Returns the scheme this credential was presented with.
    #[must_use]
    pub fn scheme(&self) -> CredentialScheme {
        match self {
            Self::Basic { .. } => CredentialScheme::Basic,
            Self::Bearer { .. } => CredentialScheme::Bearer,
        }
    }
}

// Secrets never reach logs through Debug.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

/// Session and credential lookups consumed by the authorization engine.
///
/// `Ok(None)` always means "no such session / account, or credential
/// rejected". `Err` is reserved for the store itself failing.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Loads the session referenced by a session cookie value.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    async fn load_session_by_cookie(
        &self,
        id: &SessionId,
    ) -> Result<Option<UserSession>, SessionError>;

    /// Re-reads the account behind `identity` and records the refresh on the
    /// session. Returns `None` when the account no longer exists or is disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the account backend cannot be queried.
    async fn refresh_identity(
        &self,
        session: &SessionId,
        identity: &Identity,
    ) -> Result<Option<Identity>, SessionError>;

    /// Validates a header credential. Returns `None` when it is rejected.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential backend cannot be queried.
    async fn validate_credential(
        &self,
        credential: &Credential,
    ) -> Result<Option<Identity>, SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_scheme() {
        let basic = Credential::Basic {
            username: "john".to_string(),
            password: "password".to_string(),
        };
        let bearer = Credential::Bearer {
            token: "abc".to_string(),
        };
        assert_eq!(basic.scheme(), CredentialScheme::Basic);
        assert_eq!(bearer.scheme().to_string(), "Bearer");
    }

    #[test]
    fn debug_redacts_secrets() {
        let basic = Credential::Basic {
            username: "john".to_string(),
            password: "hunter2".to_string(),
        };
        let rendered = format!("{basic:?}");
        assert!(rendered.contains("john"));
        assert!(!rendered.contains("hunter2"));

        let bearer = Credential::Bearer {
            token: "tok_secret".to_string(),
        };
        assert!(!format!("{bearer:?}").contains("tok_secret"));
    }
}
