//! Authorization decision engine for reverse proxy integrations.
//!
//! A reverse proxy asks gatehouse whether each client request may reach its
//! upstream. This crate provides:
//! - [`AuthzBuilder`], which assembles one immutable [`Authz`] per endpoint
//! - [`AuthnStrategy`], the chain of ways a request can authenticate
//! - [`Implementation`], the legacy, forward-auth and auth-request conventions
//!   for reading the original request and rendering the answer
//! - [`AuthzObserver`], the seam engine events are reported through
//!
//! Sessions and policy are consulted through the collaborator traits from
//! `gatehouse-session` and `gatehouse-policy`, bundled in [`Providers`].

pub mod adapter;
pub mod builder;
pub mod config;
pub mod error;
pub mod handler;
pub mod observer;
pub mod request;
pub mod strategy;

pub use adapter::Implementation;
pub use builder::AuthzBuilder;
pub use config::{
    AuthenticationBackendConfig, AuthzConfig, AuthzDomain, EndpointConfig, RefreshInterval,
    RefreshPolicy, SessionConfig, SessionCookieConfig, StaticConfig, StrategyConfig,
};
pub use error::{AuthzError, ConfigError, ObjectError};
pub use handler::{Authz, Decision, DenyReason, Providers};
pub use observer::{AuthzObserver, Collaborator, NoopObserver, TracingObserver};
pub use request::{AuthzRequest, AuthzResponse};
pub use strategy::{AuthnStrategy, InvalidReason, Outcome};
