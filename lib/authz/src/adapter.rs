//! Protocol adapters.
//!
//! Each reverse proxy integration encodes the original client request
//! differently and expects a differently shaped answer. [`Implementation`]
//! selects one of the three conventions and provides the four operations the
//! engine needs: derive the target object, verify it is served, and render
//! the authorized and unauthorized responses.

use gatehouse_policy::TargetObject;
use gatehouse_session::Identity;
use http::header::{HOST, LOCATION};
use http::{HeaderName, HeaderValue, Method, StatusCode};
use std::fmt;
use url::Url;

use crate::config::AuthzDomain;
use crate::error::ObjectError;
use crate::request::{AuthzRequest, AuthzResponse};

/// Scheme forwarded by the proxy.
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
/// Host forwarded by the proxy.
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
/// Path and query forwarded by the proxy.
pub const X_FORWARDED_URI: HeaderName = HeaderName::from_static("x-forwarded-uri");
/// Method forwarded by the proxy.
pub const X_FORWARDED_METHOD: HeaderName = HeaderName::from_static("x-forwarded-method");
/// Full original URL set by auth-request style proxies.
pub const X_ORIGINAL_URL: HeaderName = HeaderName::from_static("x-original-url");
/// Original method set by auth-request style proxies.
pub const X_ORIGINAL_METHOD: HeaderName = HeaderName::from_static("x-original-method");

/// Authenticated username.
pub const REMOTE_USER: HeaderName = HeaderName::from_static("remote-user");
/// Comma separated group memberships.
pub const REMOTE_GROUPS: HeaderName = HeaderName::from_static("remote-groups");
/// Display name.
pub const REMOTE_NAME: HeaderName = HeaderName::from_static("remote-name");
/// Primary email address.
pub const REMOTE_EMAIL: HeaderName = HeaderName::from_static("remote-email");

/// Query parameter carrying the original URL on redirects.
pub const QUERY_RETURN_URL: &str = "rd";
/// Query parameter carrying the original method on redirects.
pub const QUERY_RETURN_METHOD: &str = "rm";

/// The reverse proxy integration an endpoint serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Implementation {
    /// Mixed convention kept for early deployments.
    Legacy,
    /// Original request in `X-Forwarded-*` headers; the proxy follows redirects.
    ForwardAuth,
    /// Subrequest model; the proxy cannot follow redirects.
    AuthRequest,
}

impl Implementation {
    /// Returns the configuration name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::ForwardAuth => "forward-auth",
            Self::AuthRequest => "auth-request",
        }
    }

    /// Resolves a configuration name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "legacy" => Some(Self::Legacy),
            "forward-auth" => Some(Self::ForwardAuth),
            "auth-request" => Some(Self::AuthRequest),
            _ => None,
        }
    }

    /// Reconstructs the original client request.
    ///
    /// # Errors
    ///
    /// Returns an error if a required header is missing or the result is not
    /// a valid URL.
    pub fn derive_object(&self, request: &AuthzRequest) -> Result<TargetObject, ObjectError> {
        match self {
            Self::ForwardAuth => {
                let method =
                    original_method(request, &[(&X_FORWARDED_METHOD, "X-Forwarded-Method")])?;
                Ok(TargetObject::new(method, forwarded_url(request)?))
            }
            Self::Legacy => {
                let method = original_method(
                    request,
                    &[
                        (&X_ORIGINAL_METHOD, "X-Original-Method"),
                        (&X_FORWARDED_METHOD, "X-Forwarded-Method"),
                    ],
                )?;
                let url = match header_text(request, &X_ORIGINAL_URL, "X-Original-URL")? {
                    Some(original) => parse_url(original.to_string())?,
                    None => forwarded_url(request)?,
                };
                Ok(TargetObject::new(method, url))
            }
            Self::AuthRequest => {
                let method =
                    original_method(request, &[(&X_ORIGINAL_METHOD, "X-Original-Method")])?;
                let url = match header_text(request, &X_ORIGINAL_URL, "X-Original-URL")? {
                    Some(original) => parse_url(original.to_string())?,
                    None => own_url(request)?,
                };
                Ok(TargetObject::new(method, url))
            }
        }
    }

    /// Checks the object is served and returns the domain it falls under.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheme is not secure or no domain covers the host.
    pub fn verify_object<'a>(
        &self,
        object: &TargetObject,
        domains: &'a [AuthzDomain],
    ) -> Result<&'a AuthzDomain, ObjectError> {
        if !matches!(object.scheme(), "https" | "wss") {
            return Err(ObjectError::InsecureScheme {
                scheme: object.scheme().to_string(),
            });
        }

        let host = object.host();
        domains
            .iter()
            .find(|d| !host.is_empty() && d.matches(host))
            .ok_or_else(|| ObjectError::ForeignHost {
                host: host.to_string(),
            })
    }

    /// Renders the response for an allowed request.
    ///
    /// Auth-request proxies copy the identity headers from the subrequest
    /// response themselves, so the shape is the same for every implementation.
    #[must_use]
    pub fn render_authorized(&self, identity: Option<&Identity>) -> AuthzResponse {
        let mut response = AuthzResponse::new(StatusCode::OK);
        let Some(identity) = identity else {
            return response;
        };

        let groups = identity.groups().join(",");
        let values = [
            (REMOTE_USER, Some(identity.username())),
            (REMOTE_GROUPS, Some(groups.as_str())),
            (REMOTE_NAME, Some(identity.display_name())),
            (REMOTE_EMAIL, identity.primary_email()),
        ];
        for (name, value) in values {
            if let Some(value) = value.and_then(|v| HeaderValue::from_bytes(v.as_bytes()).ok()) {
                response = response.with_header(name, value);
            }
        }
        response
    }

    /// Renders the response for a request that must authenticate first.
    ///
    /// Legacy and forward-auth redirect to the login portal when one is known.
    /// Auth-request always answers 401.
    #[must_use]
    pub fn render_unauthorized(
        &self,
        request: &AuthzRequest,
        object: &TargetObject,
        domain: &AuthzDomain,
    ) -> AuthzResponse {
        let portal = match self {
            Self::AuthRequest => None,
            Self::ForwardAuth => domain.portal_url().cloned(),
            Self::Legacy => request
                .query_param(QUERY_RETURN_URL)
                .and_then(|rd| Url::parse(&rd).ok())
                .or_else(|| domain.portal_url().cloned()),
        };

        match portal {
            Some(portal) => redirect(portal, object),
            None => AuthzResponse::new(StatusCode::UNAUTHORIZED),
        }
    }
}

impl fmt::Display for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn redirect(mut portal: Url, object: &TargetObject) -> AuthzResponse {
    portal
        .query_pairs_mut()
        .append_pair(QUERY_RETURN_URL, object.url().as_str())
        .append_pair(QUERY_RETURN_METHOD, object.method().as_str());

    match HeaderValue::from_str(portal.as_str()) {
        Ok(location) => AuthzResponse::new(StatusCode::FOUND).with_header(LOCATION, location),
        Err(_) => AuthzResponse::new(StatusCode::UNAUTHORIZED),
    }
}

fn header_text<'a>(
    request: &'a AuthzRequest,
    header: &HeaderName,
    name: &'static str,
) -> Result<Option<&'a str>, ObjectError> {
    match request.headers().get(header) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|v| Some(v.trim()))
            .map_err(|e| ObjectError::InvalidHeader {
                name,
                reason: e.to_string(),
            }),
    }
}

fn required_header<'a>(
    request: &'a AuthzRequest,
    header: &HeaderName,
    name: &'static str,
) -> Result<&'a str, ObjectError> {
    match header_text(request, header, name)? {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ObjectError::MissingHeader { name }),
    }
}

fn original_method(
    request: &AuthzRequest,
    headers: &[(&HeaderName, &'static str)],
) -> Result<Method, ObjectError> {
    for &(header, name) in headers {
        if let Some(value) = header_text(request, header, name)? {
            return Method::from_bytes(value.to_ascii_uppercase().as_bytes()).map_err(|e| {
                ObjectError::InvalidHeader {
                    name,
                    reason: e.to_string(),
                }
            });
        }
    }
    Ok(request.method().clone())
}

fn forwarded_url(request: &AuthzRequest) -> Result<Url, ObjectError> {
    let proto = required_header(request, &X_FORWARDED_PROTO, "X-Forwarded-Proto")?;
    let host = required_header(request, &X_FORWARDED_HOST, "X-Forwarded-Host")?;
    let uri = header_text(request, &X_FORWARDED_URI, "X-Forwarded-URI")?.unwrap_or("/");
    parse_url(join_url(proto, host, uri))
}

fn own_url(request: &AuthzRequest) -> Result<Url, ObjectError> {
    let uri = request.uri();
    if uri.scheme().is_some() && uri.authority().is_some() {
        return parse_url(uri.to_string());
    }

    let host = match header_text(request, &HOST, "Host")? {
        Some(host) if !host.is_empty() => host,
        _ => uri
            .authority()
            .map(|a| a.as_str())
            .ok_or(ObjectError::MissingHeader { name: "Host" })?,
    };
    let proto = header_text(request, &X_FORWARDED_PROTO, "X-Forwarded-Proto")?
        .filter(|p| !p.is_empty())
        .unwrap_or("https");
    let path = uri.path_and_query().map_or("/", |p| p.as_str());
    parse_url(join_url(proto, host, path))
}

fn join_url(proto: &str, host: &str, path: &str) -> String {
    if path.starts_with('/') {
        format!("{proto}://{host}{path}")
    } else {
        format!("{proto}://{host}/{path}")
    }
}

fn parse_url(value: String) -> Result<Url, ObjectError> {
    Url::parse(&value).map_err(|e| ObjectError::InvalidUrl {
        reason: e.to_string(),
        value,
    })
}
