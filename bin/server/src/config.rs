//! Centralized server configuration.
//!
//! Loaded via the `config` crate from an optional file layered under
//! environment variables prefixed with `GATEHOUSE_`, where `__` separates
//! nested keys (`GATEHOUSE_SESSION__DOMAIN=example.com`).

use gatehouse_authz::{AuthenticationBackendConfig, EndpointConfig, SessionConfig, StaticConfig};
use gatehouse_core::Result;
use gatehouse_policy::AccessControlConfig;
use gatehouse_session::UserRecord;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::ServerError;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "GATEHOUSE";

/// Server configuration composed from library configs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_address")]
    pub address: SocketAddr,

    /// Time allowed for one authorization decision, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Identity refresh settings.
    #[serde(default)]
    pub authentication_backend: AuthenticationBackendConfig,

    /// Session cookie scopes and served domains.
    #[serde(default)]
    pub session: SessionConfig,

    /// Authorization endpoints keyed by route name.
    #[serde(default = "default_endpoints")]
    pub endpoints: BTreeMap<String, EndpointConfig>,

    /// Access control rules.
    #[serde(default)]
    pub access_control: AccessControlConfig,

    /// Static user database.
    #[serde(default)]
    pub users: Vec<UserRecord>,

    /// Opaque bearer tokens.
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

/// A bearer token bound to a user.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// The token as presented in `Authorization: Bearer`.
    pub token: String,
    /// The user the token authenticates as.
    pub username: String,
}

fn default_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9091))
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_endpoints() -> BTreeMap<String, EndpointConfig> {
    ["legacy", "forward-auth", "auth-request"]
        .into_iter()
        .map(|name| (name.to_string(), EndpointConfig::new(name)))
        .collect()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            request_timeout_ms: default_request_timeout_ms(),
            authentication_backend: AuthenticationBackendConfig::default(),
            session: SessionConfig::default(),
            endpoints: default_endpoints(),
            access_control: AccessControlConfig::default(),
            users: Vec::new(),
            tokens: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is missing or invalid.
    pub fn from_env() -> Result<Self, ServerError> {
        Self::load(None)
    }

    /// Loads configuration from an optional file, then environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a value cannot be
    /// deserialized, or the session domains are unusable.
    pub fn load(path: Option<&Path>) -> Result<Self, ServerError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(config::Config::try_deserialize)
            .map_err(|e| ServerError::Config {
                details: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Checks the parts of the configuration deserialization cannot.
    ///
    /// # Errors
    ///
    /// Returns an error if no usable domain is configured or the timeout is zero.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.request_timeout_ms == 0 {
            return Err(ServerError::InvalidConfig {
                details: "request_timeout_ms must be greater than zero".to_string(),
            }
            .into());
        }

        self.static_config()
            .validate()
            .map_err(|e| ServerError::InvalidConfig {
                details: e.to_string(),
            })?;
        Ok(())
    }

    /// Returns the subset of configuration the authorization engine reads.
    #[must_use]
    pub fn static_config(&self) -> StaticConfig {
        StaticConfig {
            authentication_backend: self.authentication_backend.clone(),
            session: self.session.clone(),
        }
    }

    /// Returns the per-request decision timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_authz::RefreshInterval;
    use gatehouse_policy::RequiredLevel;

    fn from_json(json: &str) -> ServerConfig {
        config::Config::builder()
            .add_source(config::File::from_str(json, config::FileFormat::Json))
            .build()
            .and_then(config::Config::try_deserialize)
            .expect("deserialize")
    }

    #[test]
    fn defaults_apply_to_empty_config() {
        let config = from_json("{}");
        assert_eq!(config.address, SocketAddr::from(([0, 0, 0, 0], 9091)));
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.session.name, "gatehouse_session");
        assert_eq!(
            config.endpoints.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["auth-request", "forward-auth", "legacy"]
        );
        assert!(matches!(
            config.access_control.default_policy,
            RequiredLevel::Deny
        ));
    }

    #[test]
    fn nested_sections_deserialize() {
        let config = from_json(
            r#"{
                "address": "127.0.0.1:8080",
                "authentication_backend": { "refresh_interval": "always" },
                "session": {
                    "domain": "example.com",
                    "cookies": [
                        { "domain": "example.org", "portal_url": "https://auth.example.org" }
                    ]
                },
                "endpoints": {
                    "traefik": {
                        "implementation": "forward-auth",
                        "authn_strategies": [{ "name": "HeaderAuthorization" }]
                    }
                },
                "users": [
                    { "username": "john", "password": "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA" }
                ],
                "tokens": [{ "token": "abc", "username": "john" }]
            }"#,
        );

        assert_eq!(config.address, SocketAddr::from(([127, 0, 0, 1], 8080)));
        assert_eq!(
            config.authentication_backend.refresh_interval.interval(),
            RefreshInterval::Always
        );
        assert_eq!(config.session.cookies.len(), 1);
        assert_eq!(config.endpoints.len(), 1);
        assert_eq!(config.endpoints["traefik"].authn_strategies.len(), 1);
        assert_eq!(config.users[0].identity().username(), "john");
        assert_eq!(config.tokens[0].username, "john");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_refresh_interval_fails_to_deserialize() {
        let result: std::result::Result<ServerConfig, _> = config::Config::builder()
            .add_source(config::File::from_str(
                r#"{ "authentication_backend": { "refresh_interval": "soon" } }"#,
                config::FileFormat::Json,
            ))
            .build()
            .and_then(config::Config::try_deserialize);
        assert!(result.is_err());
    }

    #[test]
    fn validate_requires_a_domain() {
        let config = ServerConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = from_json(r#"{ "session": { "domain": "example.com" } }"#);
        assert!(config.validate().is_ok());
        config.request_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn static_config_carries_session_and_backend() {
        let config = from_json(
            r#"{
                "authentication_backend": { "refresh_interval": "10m" },
                "session": { "name": "sid", "domain": "example.com" }
            }"#,
        );
        let static_config = config.static_config();
        assert_eq!(static_config.session.name, "sid");
        assert_eq!(
            static_config.authentication_backend.refresh_interval.as_str(),
            "10m"
        );
    }
}
