//! Engine assembly.

use std::sync::Arc;

use crate::adapter::Implementation;
use crate::config::{AuthzConfig, EndpointConfig, RefreshInterval, StaticConfig};
use crate::handler::Authz;
use crate::observer::{AuthzObserver, TracingObserver};
use crate::strategy::AuthnStrategy;

/// Assembles one [`Authz`] per endpoint.
///
/// ```
/// use gatehouse_authz::{AuthnStrategy, AuthzBuilder, Implementation, RefreshInterval};
///
/// let authz = AuthzBuilder::new().with_implementation_auth_request().build();
///
/// assert_eq!(authz.implementation(), Implementation::AuthRequest);
/// assert_eq!(
///     authz.strategies(),
///     &[
///         AuthnStrategy::HeaderAuthRequestProxyAuthorization,
///         AuthnStrategy::CookieSession { refresh_interval: RefreshInterval::Disabled },
///     ]
/// );
/// ```
pub struct AuthzBuilder {
    config: AuthzConfig,
    implementation: Option<Implementation>,
    strategies: Vec<AuthnStrategy>,
    observer: Arc<dyn AuthzObserver>,
}

impl Default for AuthzBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthzBuilder {
    /// Creates a builder with refresh disabled, no domains and no strategies.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: AuthzConfig::default(),
            implementation: None,
            strategies: Vec::new(),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Resolves the engine configuration from the process configuration.
    ///
    /// Seeds one domain from the session cookie domain without a portal, then
    /// one per additional cookie scope.
    #[must_use]
    pub fn with_config(self, config: &StaticConfig) -> Self {
        self.with_authz_config(AuthzConfig::from(config))
    }

    /// Sets the engine configuration directly.
    #[must_use]
    pub fn with_authz_config(mut self, config: AuthzConfig) -> Self {
        self.config = config;
        self
    }

    /// Configures the builder for one endpoint.
    ///
    /// Unknown implementation names select [`Implementation::Legacy`]. The
    /// strategy list is replaced; unknown strategy names are skipped and cookie
    /// strategies take the refresh interval of `config`.
    #[must_use]
    pub fn with_endpoint_config(mut self, config: AuthzConfig, endpoint: &EndpointConfig) -> Self {
        let implementation =
            Implementation::from_name(&endpoint.implementation).unwrap_or(Implementation::Legacy);
        self.implementation = Some(implementation);
        self.strategies = endpoint
            .authn_strategies
            .iter()
            .filter_map(|s| AuthnStrategy::from_name(&s.name, config.refresh_interval))
            .collect();
        self.config = config;
        self
    }

    /// Replaces the strategy list.
    #[must_use]
    pub fn with_strategies(mut self, strategies: Vec<AuthnStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Appends a session cookie strategy.
    #[must_use]
    pub fn with_strategy_cookie(mut self, refresh_interval: RefreshInterval) -> Self {
        self.strategies
            .push(AuthnStrategy::CookieSession { refresh_interval });
        self
    }

    /// Appends an `Authorization` header strategy.
    #[must_use]
    pub fn with_strategy_authorization(mut self) -> Self {
        self.strategies.push(AuthnStrategy::HeaderAuthorization);
        self
    }

    /// Appends a `Proxy-Authorization` header strategy.
    #[must_use]
    pub fn with_strategy_proxy_authorization(mut self) -> Self {
        self.strategies.push(AuthnStrategy::HeaderProxyAuthorization);
        self
    }

    /// Selects the legacy implementation.
    #[must_use]
    pub fn with_implementation_legacy(mut self) -> Self {
        self.implementation = Some(Implementation::Legacy);
        self
    }

    /// Selects the forward-auth implementation.
    #[must_use]
    pub fn with_implementation_forward_auth(mut self) -> Self {
        self.implementation = Some(Implementation::ForwardAuth);
        self
    }

    /// Selects the auth-request implementation.
    #[must_use]
    pub fn with_implementation_auth_request(mut self) -> Self {
        self.implementation = Some(Implementation::AuthRequest);
        self
    }

    /// Sets the observer engine events are reported to.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn AuthzObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Builds the engine.
    ///
    /// Without explicit strategies the implementation's default pair is
    /// installed, with the cookie strategy last. Without an implementation,
    /// forward-auth is used.
    #[must_use]
    pub fn build(self) -> Authz {
        let refresh_interval = self.config.refresh_interval;
        let cookie = AuthnStrategy::CookieSession { refresh_interval };

        let strategies = if self.strategies.is_empty() {
            match self.implementation {
                Some(Implementation::Legacy) => vec![AuthnStrategy::HeaderLegacy, cookie],
                Some(Implementation::AuthRequest) => {
                    vec![AuthnStrategy::HeaderAuthRequestProxyAuthorization, cookie]
                }
                _ => vec![AuthnStrategy::HeaderProxyAuthorization, cookie],
            }
        } else {
            self.strategies
        };

        let implementation = self.implementation.unwrap_or(Implementation::ForwardAuth);
        self.observer
            .endpoint_built(implementation, &strategies, &self.config);

        Authz {
            implementation,
            strategies,
            config: self.config,
            observer: self.observer,
        }
    }
}
