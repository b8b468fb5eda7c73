//! Shared application state.

use gatehouse_authz::{Authz, AuthzBuilder, AuthzConfig, Providers};
use gatehouse_core::Result;
use gatehouse_policy::AccessControl;
use gatehouse_session::MemorySessionStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::ServerError;

/// Engines and collaborators shared by every request.
pub struct AppState {
    /// One engine per configured endpoint, keyed by route name.
    pub endpoints: HashMap<String, Arc<Authz>>,
    /// The legacy engine answering `/api/verify`.
    pub verify: Arc<Authz>,
    /// Session and policy collaborators.
    pub providers: Providers,
    /// Time allowed for one decision.
    pub request_timeout: Duration,
}

impl AppState {
    /// Creates state from its parts.
    #[must_use]
    pub fn new(
        endpoints: HashMap<String, Arc<Authz>>,
        verify: Arc<Authz>,
        providers: Providers,
        request_timeout: Duration,
    ) -> Self {
        Self {
            endpoints,
            verify,
            providers,
            request_timeout,
        }
    }

    /// Builds every engine and collaborator from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an access control rule does not compile.
    pub async fn from_config(config: &ServerConfig) -> Result<Self, ServerError> {
        let policy = AccessControl::from_config(&config.access_control).map_err(|e| {
            ServerError::InvalidPolicy {
                details: e.to_string(),
            }
        })?;

        let sessions = MemorySessionStore::with_users(config.users.iter().cloned());
        for token in &config.tokens {
            sessions
                .register_token(token.token.clone(), token.username.clone())
                .await;
        }

        let static_config = config.static_config();
        let endpoints = config
            .endpoints
            .iter()
            .map(|(name, endpoint)| {
                let authz = AuthzBuilder::new()
                    .with_endpoint_config(AuthzConfig::from(&static_config), endpoint)
                    .build();
                (name.clone(), Arc::new(authz))
            })
            .collect::<HashMap<_, _>>();

        let verify = AuthzBuilder::new()
            .with_config(&static_config)
            .with_implementation_legacy()
            .build();

        info!(
            endpoints = endpoints.len(),
            users = config.users.len(),
            rules = config.access_control.rules.len(),
            "built authorization endpoints"
        );

        Ok(Self::new(
            endpoints,
            Arc::new(verify),
            Providers::new(Arc::new(sessions), Arc::new(policy)),
            config.request_timeout(),
        ))
    }

    /// Returns the engine for a named endpoint.
    #[must_use]
    pub fn endpoint(&self, name: &str) -> Option<&Arc<Authz>> {
        self.endpoints.get(name)
    }
}
