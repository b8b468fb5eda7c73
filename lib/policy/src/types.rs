//! Policy evaluation types.

use gatehouse_session::{AuthenticationLevel, Identity};
use http::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// The original client request being authorized.
///
/// Reconstructed per request by the protocol adapter from whatever the
/// calling proxy forwarded. Hosts are kept lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetObject {
    method: Method,
    url: Url,
}

impl TargetObject {
    /// Creates a target object.
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url }
    }

    /// Returns the original request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the full original URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the URL scheme.
    #[must_use]
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// Returns the host without port. Empty for URLs without a host.
    #[must_use]
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Returns the path component.
    #[must_use]
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Returns the query string, if any.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.url.query()
    }

    /// Returns the path with the query string appended, as matched by resource rules.
    #[must_use]
    pub fn path_and_query(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }
}

impl fmt::Display for TargetObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// The actor a policy decision is made for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    /// Username, absent for anonymous requests.
    pub username: Option<String>,
    /// Group memberships.
    pub groups: Vec<String>,
    /// How strongly the request was authenticated.
    pub level: AuthenticationLevel,
}

impl Subject {
    /// Creates the subject for a request without credentials.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            username: None,
            groups: Vec::new(),
            level: AuthenticationLevel::NotAuthenticated,
        }
    }

    /// Creates the subject for an authenticated identity.
    #[must_use]
    pub fn from_identity(identity: &Identity, level: AuthenticationLevel) -> Self {
        Self {
            username: Some(identity.username().to_string()),
            groups: identity.groups().to_vec(),
            level,
        }
    }

    /// Returns true if no identity is attached.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.username.is_none()
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.username {
            Some(username) => write!(f, "user:{username}"),
            None => write!(f, "<anonymous>"),
        }
    }
}

/// Level a rule requires for access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredLevel {
    /// No authentication needed.
    Bypass,
    /// Any single factor.
    OneFactor,
    /// Two factors.
    TwoFactor,
    /// Never allowed.
    Deny,
}

impl RequiredLevel {
    /// Returns the configuration name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bypass => "bypass",
            Self::OneFactor => "one_factor",
            Self::TwoFactor => "two_factor",
            Self::Deny => "deny",
        }
    }

    /// Returns true if `level` meets this requirement.
    #[must_use]
    pub fn is_satisfied_by(&self, level: AuthenticationLevel) -> bool {
        match self {
            Self::Bypass => true,
            Self::OneFactor => level >= AuthenticationLevel::OneFactor,
            Self::TwoFactor => level >= AuthenticationLevel::TwoFactor,
            Self::Deny => false,
        }
    }
}

impl fmt::Display for RequiredLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    /// The subject may access the object.
    Allow,
    /// The subject must authenticate (further) first.
    Unauthorized,
    /// The subject may never access the object.
    Forbidden,
}

impl PolicyDecision {
    /// Derives the decision from the subject's level and the required level.
    ///
    /// `subject_rule_skipped` is true when a rule that names subjects matched the
    /// object but could not be evaluated because the request is anonymous; such
    /// requests are asked to log in instead of being forbidden outright.
    #[must_use]
    pub fn from_levels(
        level: AuthenticationLevel,
        required: RequiredLevel,
        subject_rule_skipped: bool,
    ) -> Self {
        match required {
            RequiredLevel::Bypass => Self::Allow,
            RequiredLevel::Deny if level.is_authenticated() || !subject_rule_skipped => {
                Self::Forbidden
            }
            _ if required.is_satisfied_by(level) => Self::Allow,
            _ => Self::Unauthorized,
        }
    }

    /// Returns the decision name for logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
        }
    }
}

impl fmt::Display for PolicyDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
