//! Authentication strategies.
//!
//! A strategy extracts one kind of evidence from the request (a session
//! cookie, an `Authorization` header, a `Proxy-Authorization` header) and asks
//! the session collaborator to validate it. The engine runs strategies as a
//! chain: the first one that applies decides.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use gatehouse_session::{AuthenticationLevel, Credential, Identity, SessionId, SessionProvider};
use http::header::{AUTHORIZATION, PROXY_AUTHENTICATE, PROXY_AUTHORIZATION, WWW_AUTHENTICATE};
use http::{HeaderName, HeaderValue, StatusCode};
use std::fmt;

use crate::config::{AuthzDomain, RefreshInterval};
use crate::request::{AuthzRequest, AuthzResponse};

/// Challenge sent when a header credential is rejected.
pub const BASIC_CHALLENGE: &str = "Basic realm=\"Authorization Required\"";

/// One way of authenticating a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthnStrategy {
    /// The session cookie of the matched domain.
    CookieSession {
        /// How often the session's account state is re-read.
        refresh_interval: RefreshInterval,
    },
    /// The `Authorization` header.
    HeaderAuthorization,
    /// The `Proxy-Authorization` header.
    HeaderProxyAuthorization,
    /// The `Proxy-Authorization` header, challenged the way auth-request
    /// proxies can relay.
    HeaderAuthRequestProxyAuthorization,
    /// `Proxy-Authorization`, or `Authorization` when the request asks for
    /// basic auth with `auth=basic`.
    HeaderLegacy,
}

/// Result of running one strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The evidence was valid.
    Authenticated {
        /// The resolved identity.
        identity: Identity,
        /// The level the evidence proves.
        level: AuthenticationLevel,
    },
    /// The strategy found no evidence of its kind.
    NotApplicable,
    /// Evidence was present but could not be accepted.
    Invalid {
        /// Why it was not accepted.
        reason: InvalidReason,
    },
}

/// Why present evidence was not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    /// The header could not be decoded.
    Malformed {
        /// Error details.
        details: String,
    },
    /// The collaborator rejected the credential or does not know the session.
    Rejected,
    /// The session has expired.
    Expired,
    /// The session never completed a login.
    Anonymous,
    /// The account behind the session is gone or disabled.
    Revoked,
    /// The collaborator failed.
    Backend {
        /// Error details.
        details: String,
    },
}

impl InvalidReason {
    /// Returns true if the collaborator failed rather than the evidence.
    #[must_use]
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { details } => write!(f, "malformed credential: {details}"),
            Self::Rejected => f.write_str("credential rejected"),
            Self::Expired => f.write_str("session expired"),
            Self::Anonymous => f.write_str("session is not authenticated"),
            Self::Revoked => f.write_str("account no longer available"),
            Self::Backend { details } => write!(f, "backend failure: {details}"),
        }
    }
}

impl AuthnStrategy {
    /// Name used in endpoint configuration.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::CookieSession { .. } => "CookieSession",
            Self::HeaderAuthorization => "HeaderAuthorization",
            Self::HeaderProxyAuthorization => "HeaderProxyAuthorization",
            Self::HeaderAuthRequestProxyAuthorization => "HeaderAuthRequestProxyAuthorization",
            Self::HeaderLegacy => "HeaderLegacy",
        }
    }

    /// Resolves a configured strategy name. Cookie strategies are bound to
    /// `refresh_interval`.
    #[must_use]
    pub fn from_name(name: &str, refresh_interval: RefreshInterval) -> Option<Self> {
        match name {
            "CookieSession" => Some(Self::CookieSession { refresh_interval }),
            "HeaderAuthorization" => Some(Self::HeaderAuthorization),
            "HeaderProxyAuthorization" => Some(Self::HeaderProxyAuthorization),
            "HeaderAuthRequestProxyAuthorization" => {
                Some(Self::HeaderAuthRequestProxyAuthorization)
            }
            "HeaderLegacy" => Some(Self::HeaderLegacy),
            _ => None,
        }
    }

    /// Returns true if the request carries evidence this strategy reads.
    #[must_use]
    pub fn applies(&self, request: &AuthzRequest, domain: &AuthzDomain) -> bool {
        match self {
            Self::CookieSession { .. } => request.cookie(domain.cookie_name()).is_some(),
            _ => self.credential_header(request).is_some(),
        }
    }

    /// Validates the evidence through the session collaborator.
    ///
    /// The collaborator is called at most once, plus one refresh for cookie
    /// sessions that are due.
    pub async fn authenticate(
        &self,
        request: &AuthzRequest,
        domain: &AuthzDomain,
        sessions: &dyn SessionProvider,
    ) -> Outcome {
        match self {
            Self::CookieSession { refresh_interval } => {
                authenticate_cookie(*refresh_interval, request, domain, sessions).await
            }
            _ => {
                let Some(header) = self.credential_header(request) else {
                    return Outcome::NotApplicable;
                };
                authenticate_header(request, &header, sessions).await
            }
        }
    }

    /// The response to send when this strategy stopped the chain with an
    /// invalid credential. `None` leaves rendering to the adapter.
    #[must_use]
    pub fn challenge(&self, request: &AuthzRequest) -> Option<AuthzResponse> {
        let challenge = HeaderValue::from_static(BASIC_CHALLENGE);
        match self {
            Self::CookieSession { .. } => None,
            Self::HeaderAuthorization | Self::HeaderAuthRequestProxyAuthorization => Some(
                AuthzResponse::new(StatusCode::UNAUTHORIZED)
                    .with_header(WWW_AUTHENTICATE, challenge),
            ),
            Self::HeaderProxyAuthorization => Some(
                AuthzResponse::new(StatusCode::PROXY_AUTHENTICATION_REQUIRED)
                    .with_header(PROXY_AUTHENTICATE, challenge),
            ),
            Self::HeaderLegacy => is_basic_auth_requested(request).then(|| {
                AuthzResponse::new(StatusCode::UNAUTHORIZED)
                    .with_header(WWW_AUTHENTICATE, challenge)
            }),
        }
    }

    fn credential_header(&self, request: &AuthzRequest) -> Option<HeaderName> {
        let header = match self {
            Self::CookieSession { .. } => return None,
            Self::HeaderAuthorization => AUTHORIZATION,
            Self::HeaderProxyAuthorization | Self::HeaderAuthRequestProxyAuthorization => {
                PROXY_AUTHORIZATION
            }
            Self::HeaderLegacy => {
                if request.has_header(&PROXY_AUTHORIZATION) {
                    PROXY_AUTHORIZATION
                } else if is_basic_auth_requested(request) {
                    AUTHORIZATION
                } else {
                    return None;
                }
            }
        };
        request.has_header(&header).then_some(header)
    }
}

impl fmt::Display for AuthnStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn is_basic_auth_requested(request: &AuthzRequest) -> bool {
    request
        .query_param("auth")
        .is_some_and(|v| v.eq_ignore_ascii_case("basic"))
}

async fn authenticate_cookie(
    refresh_interval: RefreshInterval,
    request: &AuthzRequest,
    domain: &AuthzDomain,
    sessions: &dyn SessionProvider,
) -> Outcome {
    let Some(value) = request.cookie(domain.cookie_name()) else {
        return Outcome::NotApplicable;
    };

    let session = match sessions.load_session_by_cookie(&SessionId::from(value)).await {
        Ok(Some(session)) => session,
        Ok(None) => return invalid(InvalidReason::Rejected),
        Err(e) => return backend(&e),
    };

    if session.is_expired() {
        return invalid(InvalidReason::Expired);
    }
    if session.is_anonymous() {
        return invalid(InvalidReason::Anonymous);
    }

    let identity = if refresh_interval.requires_refresh(session.last_refreshed_at(), Utc::now()) {
        match sessions
            .refresh_identity(session.id(), session.identity())
            .await
        {
            Ok(Some(identity)) => identity,
            Ok(None) => return invalid(InvalidReason::Revoked),
            Err(e) => return backend(&e),
        }
    } else {
        session.identity().clone()
    };

    Outcome::Authenticated {
        identity,
        level: session.level(),
    }
}

async fn authenticate_header(
    request: &AuthzRequest,
    header: &HeaderName,
    sessions: &dyn SessionProvider,
) -> Outcome {
    let credential = match request
        .header(header)
        .ok_or_else(|| "header is not valid text".to_string())
        .and_then(parse_credential)
    {
        Ok(credential) => credential,
        Err(details) => return invalid(InvalidReason::Malformed { details }),
    };

    match sessions.validate_credential(&credential).await {
        Ok(Some(identity)) => Outcome::Authenticated {
            identity,
            level: AuthenticationLevel::OneFactor,
        },
        Ok(None) => invalid(InvalidReason::Rejected),
        Err(e) => backend(&e),
    }
}

/// Decodes a `Basic` or `Bearer` header value.
///
/// # Errors
///
/// Returns a description of the problem for unknown schemes or undecodable
/// values.
pub fn parse_credential(value: &str) -> Result<Credential, String> {
    let (scheme, payload) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| "expected '<scheme> <value>'".to_string())?;
    let payload = payload.trim();

    if scheme.eq_ignore_ascii_case("basic") {
        let decoded = STANDARD
            .decode(payload)
            .map_err(|e| format!("invalid base64: {e}"))?;
        let decoded = String::from_utf8(decoded).map_err(|e| format!("invalid utf-8: {e}"))?;
        let (username, password) = decoded
            .split_once(':')
            .ok_or_else(|| "expected 'username:password'".to_string())?;
        if username.is_empty() {
            return Err("empty username".to_string());
        }
        Ok(Credential::Basic {
            username: username.to_string(),
            password: password.to_string(),
        })
    } else if scheme.eq_ignore_ascii_case("bearer") {
        if payload.is_empty() {
            return Err("empty token".to_string());
        }
        Ok(Credential::Bearer {
            token: payload.to_string(),
        })
    } else {
        Err(format!("unsupported scheme '{scheme}'"))
    }
}

fn invalid(reason: InvalidReason) -> Outcome {
    Outcome::Invalid { reason }
}

fn backend(error: &impl fmt::Display) -> Outcome {
    invalid(InvalidReason::Backend {
        details: error.to_string(),
    })
}
