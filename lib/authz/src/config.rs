//! Engine configuration.
//!
//! [`StaticConfig`] is the slice of the process configuration the engine reads.
//! [`AuthzConfig`] is the resolved, immutable value each [`Authz`](crate::Authz)
//! holds: the refresh interval and the ordered list of served domains.

use chrono::{DateTime, Utc};
use gatehouse_core::parse_duration_string;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::error::ConfigError;

/// Default session cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "gatehouse_session";

/// How often a session's account state is re-read from the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshInterval {
    /// Never re-read for the lifetime of the session.
    #[default]
    Disabled,
    /// Re-read on every request.
    Always,
    /// Re-read once the interval has elapsed since the last refresh.
    Every(Duration),
}

impl RefreshInterval {
    /// Returns true if a session last refreshed at `last_refreshed_at` must be
    /// refreshed at `now`.
    #[must_use]
    pub fn requires_refresh(&self, last_refreshed_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            Self::Disabled => false,
            Self::Always => true,
            Self::Every(interval) => match chrono::Duration::from_std(*interval) {
                Ok(interval) => now.signed_duration_since(last_refreshed_at) >= interval,
                // Out of chrono's range: effectively never elapses.
                Err(_) => false,
            },
        }
    }
}

impl fmt::Display for RefreshInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("disabled"),
            Self::Always => f.write_str("always"),
            Self::Every(interval) => write!(f, "{}s", interval.as_secs()),
        }
    }
}

/// The configured refresh policy string, validated on deserialisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefreshPolicy {
    raw: String,
    interval: RefreshInterval,
}

impl RefreshPolicy {
    /// Returns the resolved interval.
    #[must_use]
    pub fn interval(&self) -> RefreshInterval {
        self.interval
    }

    /// Returns the string as configured.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl TryFrom<String> for RefreshPolicy {
    type Error = ConfigError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        let value = raw.trim();
        let interval = if value.eq_ignore_ascii_case("disabled") {
            RefreshInterval::Disabled
        } else if value.eq_ignore_ascii_case("always") {
            RefreshInterval::Always
        } else {
            let duration =
                parse_duration_string(value).map_err(|e| ConfigError::InvalidRefreshInterval {
                    value: raw.clone(),
                    reason: e.to_string(),
                })?;
            if duration.is_zero() {
                RefreshInterval::Always
            } else {
                RefreshInterval::Every(duration)
            }
        };

        Ok(Self { raw, interval })
    }
}

impl From<RefreshPolicy> for String {
    fn from(policy: RefreshPolicy) -> Self {
        policy.raw
    }
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            raw: "5m".to_string(),
            interval: RefreshInterval::Every(Duration::from_secs(300)),
        }
    }
}

/// Authentication backend settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationBackendConfig {
    /// Refresh policy for session identities.
    #[serde(default)]
    pub refresh_interval: RefreshPolicy,
}

/// Session cookie settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Cookie name.
    #[serde(default = "default_cookie_name")]
    pub name: String,
    /// Cookie domain. Served without a portal URL.
    #[serde(default)]
    pub domain: String,
    /// Additional cookie scopes, each with its own portal.
    #[serde(default)]
    pub cookies: Vec<SessionCookieConfig>,
}

fn default_cookie_name() -> String {
    DEFAULT_COOKIE_NAME.to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: default_cookie_name(),
            domain: String::new(),
            cookies: Vec::new(),
        }
    }
}

/// An additional cookie scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookieConfig {
    /// Cookie domain.
    pub domain: String,
    /// Cookie name; the session-wide name when unset.
    #[serde(default)]
    pub name: Option<String>,
    /// Login portal for requests under this domain.
    #[serde(default)]
    pub portal_url: Option<Url>,
}

/// The process configuration the engine is built from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticConfig {
    /// Authentication backend settings.
    #[serde(default)]
    pub authentication_backend: AuthenticationBackendConfig,
    /// Session cookie settings.
    #[serde(default)]
    pub session: SessionConfig,
}

impl StaticConfig {
    /// Checks the domains the engine will serve.
    ///
    /// # Errors
    ///
    /// Returns an error if no domain is configured or a domain is malformed.
    pub fn validate(&self) -> Result<(), Report<ConfigError>> {
        let domains = std::iter::once(self.session.domain.as_str())
            .filter(|d| !d.is_empty())
            .chain(self.session.cookies.iter().map(|c| c.domain.as_str()))
            .collect::<Vec<_>>();

        if domains.is_empty() {
            return Err(ConfigError::InvalidDomain {
                value: String::new(),
            }
            .into());
        }

        for domain in domains {
            let name = domain.trim_start_matches('.');
            let malformed = name.is_empty()
                || name
                    .chars()
                    .any(|c| c.is_whitespace() || matches!(c, '/' | ':' | '*' | '?' | '#'));
            if malformed {
                return Err(ConfigError::InvalidDomain {
                    value: domain.to_string(),
                }
                .into());
            }
        }

        Ok(())
    }
}

/// Which adapter and strategies an endpoint uses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// `legacy`, `forward-auth` or `auth-request`.
    #[serde(default)]
    pub implementation: String,
    /// Strategies in evaluation order. Empty selects the implementation defaults.
    #[serde(default)]
    pub authn_strategies: Vec<StrategyConfig>,
}

impl EndpointConfig {
    /// Creates an endpoint config with default strategies.
    #[must_use]
    pub fn new(implementation: impl Into<String>) -> Self {
        Self {
            implementation: implementation.into(),
            authn_strategies: Vec::new(),
        }
    }

    /// Appends a strategy by name.
    #[must_use]
    pub fn with_strategy(mut self, name: impl Into<String>) -> Self {
        self.authn_strategies.push(StrategyConfig { name: name.into() });
        self
    }
}

/// A strategy entry in an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Strategy name, e.g. `CookieSession`.
    pub name: String,
}

/// A served cookie scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthzDomain {
    name: String,
    cookie_name: String,
    portal_url: Option<Url>,
}

impl AuthzDomain {
    /// Creates a served domain.
    ///
    /// The name is stored lowercase with a single leading dot.
    #[must_use]
    pub fn new(domain: &str, portal_url: Option<Url>) -> Self {
        let name = domain.trim().trim_start_matches('.').to_ascii_lowercase();
        Self {
            name: format!(".{name}"),
            cookie_name: default_cookie_name(),
            portal_url,
        }
    }

    /// Sets the session cookie name for this domain.
    #[must_use]
    pub fn with_cookie_name(mut self, cookie_name: impl Into<String>) -> Self {
        self.cookie_name = cookie_name.into();
        self
    }

    /// Returns the domain name with its leading dot.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the session cookie name.
    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Returns the login portal URL, if any.
    #[must_use]
    pub fn portal_url(&self) -> Option<&Url> {
        self.portal_url.as_ref()
    }

    /// Returns true if `host` is the domain itself or any subdomain of it.
    #[must_use]
    pub fn matches(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        host == self.name[1..] || host.ends_with(&self.name)
    }
}

/// Resolved engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthzConfig {
    /// Refresh interval bound to cookie strategies.
    pub refresh_interval: RefreshInterval,
    /// Served domains, first match wins.
    pub domains: Vec<AuthzDomain>,
}

impl AuthzConfig {
    /// Returns the first served domain covering `host`.
    #[must_use]
    pub fn domain_for(&self, host: &str) -> Option<&AuthzDomain> {
        self.domains.iter().find(|d| d.matches(host))
    }
}

impl From<&StaticConfig> for AuthzConfig {
    fn from(config: &StaticConfig) -> Self {
        let session = &config.session;
        let mut domains = Vec::with_capacity(session.cookies.len() + 1);

        if !session.domain.is_empty() {
            domains.push(AuthzDomain::new(&session.domain, None).with_cookie_name(&session.name));
        }

        for cookie in &session.cookies {
            let name = cookie.name.as_deref().unwrap_or(&session.name);
            domains.push(
                AuthzDomain::new(&cookie.domain, cookie.portal_url.clone()).with_cookie_name(name),
            );
        }

        Self {
            refresh_interval: config.authentication_backend.refresh_interval.interval(),
            domains,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn policy(value: &str) -> RefreshPolicy {
        RefreshPolicy::try_from(value.to_string()).expect("valid policy")
    }

    #[test]
    fn refresh_policy_forms() {
        assert_eq!(policy("disabled").interval(), RefreshInterval::Disabled);
        assert_eq!(policy("ALWAYS").interval(), RefreshInterval::Always);
        assert_eq!(
            policy("5m").interval(),
            RefreshInterval::Every(Duration::from_secs(300))
        );
        assert_eq!(policy("0s").interval(), RefreshInterval::Always);
        assert!(RefreshPolicy::try_from("soon".to_string()).is_err());
    }

    #[test]
    fn refresh_policy_deserializes_from_string() {
        let config: AuthenticationBackendConfig =
            serde_json::from_str(r#"{"refresh_interval": "1h"}"#).expect("deserialize");
        assert_eq!(
            config.refresh_interval.interval(),
            RefreshInterval::Every(Duration::from_secs(3600))
        );
        assert_eq!(config.refresh_interval.as_str(), "1h");

        let err = serde_json::from_str::<AuthenticationBackendConfig>(
            r#"{"refresh_interval": "whenever"}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn requires_refresh_by_interval() {
        let now = Utc::now();
        let recent = now - ChronoDuration::seconds(30);
        let stale = now - ChronoDuration::hours(2);
        let hourly = RefreshInterval::Every(Duration::from_secs(3600));

        assert!(!RefreshInterval::Disabled.requires_refresh(stale, now));
        assert!(RefreshInterval::Always.requires_refresh(now, now));
        assert!(!hourly.requires_refresh(recent, now));
        assert!(hourly.requires_refresh(stale, now));
        assert!(hourly.requires_refresh(now - ChronoDuration::hours(1), now));
    }

    #[test]
    fn domain_suffix_matching() {
        let domain = AuthzDomain::new("Example.com", None);
        assert_eq!(domain.name(), ".example.com");
        assert!(domain.matches("example.com"));
        assert!(domain.matches("app.example.com"));
        assert!(domain.matches("deep.app.EXAMPLE.com"));
        assert!(!domain.matches("attacker.com"));
        assert!(!domain.matches("notexample.com"));
        assert!(!domain.matches("example.com.attacker.com"));
    }

    #[test]
    fn authz_config_from_static_config() {
        let config = StaticConfig {
            authentication_backend: AuthenticationBackendConfig {
                refresh_interval: policy("always"),
            },
            session: SessionConfig {
                name: "sid".to_string(),
                domain: "example.com".to_string(),
                cookies: vec![SessionCookieConfig {
                    domain: "example.org".to_string(),
                    name: None,
                    portal_url: Some(Url::parse("https://auth.example.org/").expect("url")),
                }],
            },
        };

        let authz = AuthzConfig::from(&config);
        assert_eq!(authz.refresh_interval, RefreshInterval::Always);
        assert_eq!(authz.domains.len(), 2);
        assert_eq!(authz.domains[0].name(), ".example.com");
        assert!(authz.domains[0].portal_url().is_none());
        assert_eq!(authz.domains[0].cookie_name(), "sid");
        assert_eq!(authz.domains[1].cookie_name(), "sid");
        assert!(authz.domains[1].portal_url().is_some());
        assert_eq!(
            authz.domain_for("www.example.org").map(AuthzDomain::name),
            Some(".example.org")
        );
    }

    #[test]
    fn validate_rejects_missing_and_malformed_domains() {
        assert!(StaticConfig::default().validate().is_err());

        let mut config = StaticConfig::default();
        config.session.domain = "example.com".to_string();
        assert!(config.validate().is_ok());

        config.session.domain = "https://example.com".to_string();
        assert!(config.validate().is_err());
    }
}
