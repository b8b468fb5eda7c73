//! Decision events.
//!
//! The engine reports what it does through an [`AuthzObserver`] instead of
//! logging directly. [`TracingObserver`] is the default and writes structured
//! `tracing` events; audit-relevant events go to the `gatehouse::audit` target.

use gatehouse_policy::{Subject, TargetObject};
use gatehouse_session::Identity;
use tracing::{debug, error, info, warn};

use crate::adapter::Implementation;
use crate::config::AuthzConfig;
use crate::error::ObjectError;
use crate::request::AuthzRequest;
use crate::strategy::{AuthnStrategy, InvalidReason};

/// Which collaborator failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    /// The session and credential store.
    Sessions,
    /// The policy evaluator.
    Policy,
}

impl Collaborator {
    /// Returns the name used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sessions => "sessions",
            Self::Policy => "policy",
        }
    }
}

/// Receives engine events. Every method defaults to doing nothing.
pub trait AuthzObserver: Send + Sync {
    /// An engine was built.
    fn endpoint_built(
        &self,
        _implementation: Implementation,
        _strategies: &[AuthnStrategy],
        _config: &AuthzConfig,
    ) {
    }

    /// The target object could not be derived or is not served.
    fn object_rejected(&self, _request: &AuthzRequest, _error: &ObjectError) {}

    /// A strategy applied and was run.
    fn strategy_attempted(&self, _object: &TargetObject, _strategy: AuthnStrategy) {}

    /// A strategy rejected the evidence it found.
    fn credential_invalid(
        &self,
        _object: &TargetObject,
        _strategy: AuthnStrategy,
        _reason: &InvalidReason,
    ) {
    }

    /// A collaborator failed.
    fn backend_failure(
        &self,
        _object: &TargetObject,
        _collaborator: Collaborator,
        _details: &str,
    ) {
    }

    /// The request was allowed.
    fn authorized(&self, _object: &TargetObject, _identity: Option<&Identity>) {}

    /// The request must authenticate first.
    fn unauthorized(&self, _object: &TargetObject, _subject: &Subject) {}

    /// The request is never allowed for this subject.
    fn forbidden(&self, _object: &TargetObject, _subject: &Subject) {}

    /// The request was cancelled before a decision.
    fn cancelled(&self, _object: &TargetObject) {}
}

/// Observer that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl AuthzObserver for NoopObserver {}

/// Observer that writes `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl AuthzObserver for TracingObserver {
    fn endpoint_built(
        &self,
        implementation: Implementation,
        strategies: &[AuthnStrategy],
        config: &AuthzConfig,
    ) {
        let strategies = strategies
            .iter()
            .map(AuthnStrategy::name)
            .collect::<Vec<_>>()
            .join(",");
        let domains = config
            .domains
            .iter()
            .map(|d| d.name())
            .collect::<Vec<_>>()
            .join(",");
        debug!(
            %implementation,
            %strategies,
            %domains,
            refresh_interval = %config.refresh_interval,
            "built authorization endpoint"
        );
    }

    fn object_rejected(&self, request: &AuthzRequest, error: &ObjectError) {
        warn!(
            target: "gatehouse::audit",
            method = %request.method(),
            uri = %request.uri(),
            request_id = request.metadata("request_id"),
            %error,
            "rejected target object"
        );
    }

    fn strategy_attempted(&self, object: &TargetObject, strategy: AuthnStrategy) {
        debug!(%object, %strategy, "running authentication strategy");
    }

    fn credential_invalid(
        &self,
        object: &TargetObject,
        strategy: AuthnStrategy,
        reason: &InvalidReason,
    ) {
        warn!(
            target: "gatehouse::audit",
            %object,
            %strategy,
            %reason,
            "invalid credentials"
        );
    }

    fn backend_failure(&self, object: &TargetObject, collaborator: Collaborator, details: &str) {
        error!(
            %object,
            collaborator = collaborator.as_str(),
            details,
            "collaborator failure, denying request"
        );
    }

    fn authorized(&self, object: &TargetObject, identity: Option<&Identity>) {
        debug!(
            %object,
            user = identity.map(Identity::username),
            "access granted"
        );
    }

    fn unauthorized(&self, object: &TargetObject, subject: &Subject) {
        debug!(%object, %subject, level = %subject.level, "authentication required");
    }

    fn forbidden(&self, object: &TargetObject, subject: &Subject) {
        info!(
            target: "gatehouse::audit",
            %object,
            %subject,
            "access forbidden"
        );
    }

    fn cancelled(&self, object: &TargetObject) {
        warn!(%object, "authorization cancelled");
    }
}
