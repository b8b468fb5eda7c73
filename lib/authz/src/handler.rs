//! The decision engine.

use gatehouse_policy::{PolicyDecision, PolicyEvaluator, Subject, TargetObject};
use gatehouse_session::{Identity, SessionProvider};
use http::StatusCode;
use rootcause::Report;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::adapter::Implementation;
use crate::config::{AuthzConfig, AuthzDomain};
use crate::error::{AuthzError, ObjectError};
use crate::observer::{AuthzObserver, Collaborator};
use crate::request::{AuthzRequest, AuthzResponse};
use crate::strategy::{AuthnStrategy, InvalidReason, Outcome};

/// The collaborators a decision consults.
#[derive(Clone)]
pub struct Providers {
    /// Session and credential store.
    pub sessions: Arc<dyn SessionProvider>,
    /// Policy evaluator.
    pub policy: Arc<dyn PolicyEvaluator>,
}

impl Providers {
    /// Bundles the collaborators.
    #[must_use]
    pub fn new(sessions: Arc<dyn SessionProvider>, policy: Arc<dyn PolicyEvaluator>) -> Self {
        Self { sessions, policy }
    }
}

/// Why a request was denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// The target object could not be derived or is not served.
    RejectedObject,
    /// No strategy found evidence and the object is not public.
    CredentialAbsent,
    /// A strategy found evidence and rejected it.
    CredentialInvalid(InvalidReason),
    /// Authenticated, but not strongly enough.
    InsufficientLevel,
    /// The subject may never access the object.
    Forbidden,
    /// A collaborator failed.
    CollaboratorFailure,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RejectedObject => f.write_str("target object rejected"),
            Self::CredentialAbsent => f.write_str("no credentials"),
            Self::CredentialInvalid(reason) => write!(f, "invalid credentials: {reason}"),
            Self::InsufficientLevel => f.write_str("insufficient authentication level"),
            Self::Forbidden => f.write_str("forbidden"),
            Self::CollaboratorFailure => f.write_str("collaborator failure"),
        }
    }
}

/// The engine's answer for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Let the request through.
    Allow {
        /// The authenticated identity; `None` for public objects.
        identity: Option<Identity>,
        /// The rendered response.
        response: AuthzResponse,
    },
    /// Stop the request.
    Deny {
        /// Why.
        reason: DenyReason,
        /// The rendered response.
        response: AuthzResponse,
    },
}

impl Decision {
    /// Returns true for [`Decision::Allow`].
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }

    /// Returns the rendered response.
    #[must_use]
    pub fn response(&self) -> &AuthzResponse {
        match self {
            Self::Allow { response, .. } | Self::Deny { response, .. } => response,
        }
    }

    /// Consumes the decision, returning the rendered response.
    #[must_use]
    pub fn into_response(self) -> AuthzResponse {
        match self {
            Self::Allow { response, .. } | Self::Deny { response, .. } => response,
        }
    }
}

/// An immutable authorization engine bound to one endpoint.
///
/// Built by [`AuthzBuilder`](crate::AuthzBuilder). Holds no per-request
/// state, so one instance serves any number of concurrent requests.
#[derive(Clone)]
pub struct Authz {
    pub(crate) implementation: Implementation,
    pub(crate) strategies: Vec<AuthnStrategy>,
    pub(crate) config: AuthzConfig,
    pub(crate) observer: Arc<dyn AuthzObserver>,
}

impl fmt::Debug for Authz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authz")
            .field("implementation", &self.implementation)
            .field("strategies", &self.strategies)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Authz {
    /// Returns the bound implementation.
    #[must_use]
    pub fn implementation(&self) -> Implementation {
        self.implementation
    }

    /// Returns the strategy chain in evaluation order.
    #[must_use]
    pub fn strategies(&self) -> &[AuthnStrategy] {
        &self.strategies
    }

    /// Returns the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &AuthzConfig {
        &self.config
    }

    /// Decides whether the request may reach its upstream.
    ///
    /// Collaborator failures end in a deny decision, never an error.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Cancelled`] if `cancel` fires before a decision
    /// is reached. In-flight collaborator calls are dropped.
    pub async fn authorize(
        &self,
        request: &AuthzRequest,
        providers: &Providers,
        cancel: &CancellationToken,
    ) -> Result<Decision, Report<AuthzError>> {
        let object = match self.implementation.derive_object(request) {
            Ok(object) => object,
            Err(error) => return Ok(self.reject(request, &error)),
        };
        let domain = match self
            .implementation
            .verify_object(&object, &self.config.domains)
        {
            Ok(domain) => domain,
            Err(error) => return Ok(self.reject(request, &error)),
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                self.observer.cancelled(&object);
                Err(AuthzError::Cancelled.into())
            }
            decision = self.decide(request, &object, domain, providers) => Ok(decision),
        }
    }

    fn reject(&self, request: &AuthzRequest, error: &ObjectError) -> Decision {
        self.observer.object_rejected(request, error);
        Decision::Deny {
            reason: DenyReason::RejectedObject,
            response: AuthzResponse::new(StatusCode::BAD_REQUEST),
        }
    }

    async fn decide(
        &self,
        request: &AuthzRequest,
        object: &TargetObject,
        domain: &AuthzDomain,
        providers: &Providers,
    ) -> Decision {
        let (subject, identity) = match self
            .authenticate(request, object, domain, providers.sessions.as_ref())
            .await
        {
            Some((_, Outcome::Authenticated { identity, level })) => {
                (Subject::from_identity(&identity, level), Some(identity))
            }
            Some((strategy, Outcome::Invalid { reason })) => {
                return self.deny_invalid(request, object, domain, strategy, reason);
            }
            Some((_, Outcome::NotApplicable)) | None => (Subject::anonymous(), None),
        };

        match providers.policy.evaluate(&subject, object).await {
            Ok(PolicyDecision::Allow) => {
                self.observer.authorized(object, identity.as_ref());
                Decision::Allow {
                    response: self.implementation.render_authorized(identity.as_ref()),
                    identity,
                }
            }
            Ok(PolicyDecision::Unauthorized) => {
                self.observer.unauthorized(object, &subject);
                let reason = if identity.is_some() {
                    DenyReason::InsufficientLevel
                } else {
                    DenyReason::CredentialAbsent
                };
                Decision::Deny {
                    reason,
                    response: self
                        .implementation
                        .render_unauthorized(request, object, domain),
                }
            }
            Ok(PolicyDecision::Forbidden) => {
                self.observer.forbidden(object, &subject);
                Decision::Deny {
                    reason: DenyReason::Forbidden,
                    response: AuthzResponse::new(StatusCode::FORBIDDEN),
                }
            }
            Err(error) => {
                self.observer
                    .backend_failure(object, Collaborator::Policy, &error.to_string());
                Decision::Deny {
                    reason: DenyReason::CollaboratorFailure,
                    response: self
                        .implementation
                        .render_unauthorized(request, object, domain),
                }
            }
        }
    }

    /// Runs the chain. Returns the first strategy that applied together with
    /// its outcome, or `None` if none applied.
    async fn authenticate(
        &self,
        request: &AuthzRequest,
        object: &TargetObject,
        domain: &AuthzDomain,
        sessions: &dyn SessionProvider,
    ) -> Option<(AuthnStrategy, Outcome)> {
        for strategy in &self.strategies {
            if !strategy.applies(request, domain) {
                continue;
            }
            self.observer.strategy_attempted(object, *strategy);
            match strategy.authenticate(request, domain, sessions).await {
                Outcome::NotApplicable => continue,
                outcome => return Some((*strategy, outcome)),
            }
        }
        None
    }

    fn deny_invalid(
        &self,
        request: &AuthzRequest,
        object: &TargetObject,
        domain: &AuthzDomain,
        strategy: AuthnStrategy,
        reason: InvalidReason,
    ) -> Decision {
        if reason.is_backend() {
            self.observer
                .backend_failure(object, Collaborator::Sessions, &reason.to_string());
        } else {
            self.observer.credential_invalid(object, strategy, &reason);
        }

        let response = strategy
            .challenge(request)
            .unwrap_or_else(|| self.implementation.render_unauthorized(request, object, domain));
        let reason = if reason.is_backend() {
            DenyReason::CollaboratorFailure
        } else {
            DenyReason::CredentialInvalid(reason)
        };

        Decision::Deny { reason, response }
    }
}
