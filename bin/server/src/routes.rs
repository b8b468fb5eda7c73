//! HTTP routes.
//!
//! Each configured endpoint is served at `/api/authz/{name}`; `/api/verify`
//! answers with the legacy engine. Every request gets its own cancellation
//! token, cancelled when the decision times out.

use axum::{
    Router,
    extract::{ConnectInfo, Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{any, get},
};
use gatehouse_authz::{Authz, AuthzRequest};
use gatehouse_core::RequestId;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::AppState;

/// Builds the router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/verify", any(verify))
        .route("/api/authz/{name}", any(authz_endpoint))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn verify(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let authz = state.verify.clone();
    decide(&state, &authz, request).await
}

async fn authz_endpoint(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    request: Request,
) -> Response {
    let Some(authz) = state.endpoint(&name).cloned() else {
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    };
    decide(&state, &authz, request).await
}

async fn decide(state: &AppState, authz: &Authz, request: Request) -> Response {
    let (parts, _body) = request.into_parts();
    let request_id = RequestId::new();

    let mut authz_request = AuthzRequest::new(parts.method, parts.uri)
        .with_headers(parts.headers)
        .with_metadata("request_id", request_id.to_string());
    if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        authz_request = authz_request.with_metadata("remote_addr", addr.to_string());
    }

    let cancel = CancellationToken::new();
    let authorize = authz.authorize(&authz_request, &state.providers, &cancel);
    tokio::pin!(authorize);
    let result = tokio::select! {
        result = &mut authorize => result,
        () = tokio::time::sleep(state.request_timeout) => {
            cancel.cancel();
            authorize.await
        }
    };

    match result {
        Ok(decision) => {
            let (status, headers, body) = decision.into_response().into_parts();
            (status, headers, body.unwrap_or_default()).into_response()
        }
        Err(e) => {
            warn!(%request_id, error = %e, "authorization did not complete");
            (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{HeaderMap, header};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use gatehouse_authz::{AuthzBuilder, AuthzConfig, AuthzDomain, Providers, RefreshInterval};
    use gatehouse_core::Result;
    use gatehouse_policy::AccessControl;
    use gatehouse_session::{
        Credential, Identity, SessionError, SessionId, SessionProvider, UserRecord, UserSession,
        hash_password,
    };
    use std::collections::HashMap;
    use std::time::Duration;
    use tower::ServiceExt;
    use url::Url;

    async fn app() -> Router {
        let mut config: ServerConfig = config::Config::builder()
            .add_source(config::File::from_str(
                r#"{
                    "session": {
                        "domain": "example.com",
                        "cookies": [
                            { "domain": "example.org", "portal_url": "https://auth.example.org" }
                        ]
                    },
                    "access_control": {
                        "default_policy": "one_factor",
                        "rules": [
                            { "domain": ["public.example.com"], "policy": "bypass" },
                            { "domain": ["admin.example.com"], "policy": "deny" }
                        ]
                    },
                    "tokens": [{ "token": "opaque-token", "username": "john" }]
                }"#,
                config::FileFormat::Json,
            ))
            .build()
            .and_then(config::Config::try_deserialize)
            .expect("config");

        let identity = Identity::new("john")
            .with_display_name("John Doe")
            .with_emails(vec!["john@example.com".to_string()])
            .with_groups(vec!["admins".to_string(), "dev".to_string()]);
        config.users.push(UserRecord::new(
            identity,
            hash_password("secret").expect("hash"),
        ));

        let state = AppState::from_config(&config).await.expect("state");
        router(Arc::new(state))
    }

    fn basic(username: &str, password: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
    }

    fn forwarded(uri: &str, host: &str) -> axum::http::request::Builder {
        Request::builder()
            .uri(uri)
            .header("X-Forwarded-Proto", "https")
            .header("X-Forwarded-Host", host)
            .header("X-Forwarded-URI", "/")
            .header("X-Forwarded-Method", "GET")
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
        headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let response = app()
            .await
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
    }

    #[tokio::test]
    async fn forward_auth_allows_valid_proxy_credentials() {
        let response = app()
            .await
            .oneshot(
                forwarded("/api/authz/forward-auth", "app.example.com")
                    .header(header::PROXY_AUTHORIZATION, basic("john", "secret"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(header_str(headers, "remote-user"), Some("john"));
        assert_eq!(header_str(headers, "remote-groups"), Some("admins,dev"));
        assert_eq!(header_str(headers, "remote-name"), Some("John Doe"));
        assert_eq!(header_str(headers, "remote-email"), Some("john@example.com"));
    }

    #[tokio::test]
    async fn forward_auth_challenges_wrong_password() {
        let response = app()
            .await
            .oneshot(
                forwarded("/api/authz/forward-auth", "app.example.com")
                    .header(header::PROXY_AUTHORIZATION, basic("john", "wrong"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::PROXY_AUTHENTICATION_REQUIRED);
        assert!(response.headers().contains_key(header::PROXY_AUTHENTICATE));
    }

    #[tokio::test]
    async fn anonymous_request_to_bypass_domain_is_allowed() {
        let response = app()
            .await
            .oneshot(
                forwarded("/api/authz/forward-auth", "public.example.com")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response.headers().contains_key("remote-user"));
    }

    #[tokio::test]
    async fn authenticated_request_to_denied_domain_is_forbidden() {
        let response = app()
            .await
            .oneshot(
                forwarded("/api/authz/forward-auth", "admin.example.com")
                    .header(header::PROXY_AUTHORIZATION, basic("john", "secret"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn forward_auth_redirects_to_domain_portal() {
        let response = app()
            .await
            .oneshot(
                forwarded("/api/authz/forward-auth", "app.example.org")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::FOUND);
        let location = header_str(response.headers(), "location").expect("location");
        assert!(location.starts_with("https://auth.example.org/?"));
        assert!(location.contains("rd=https%3A%2F%2Fapp.example.org%2F"));
        assert!(location.contains("rm=GET"));
    }

    #[tokio::test]
    async fn foreign_host_is_rejected() {
        let response = app()
            .await
            .oneshot(
                forwarded("/api/authz/forward-auth", "evil.test")
                    .header(header::PROXY_AUTHORIZATION, basic("john", "secret"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn auth_request_uses_original_url_and_bearer_token() {
        let response = app()
            .await
            .oneshot(
                Request::builder()
                    .uri("/api/authz/auth-request")
                    .header("X-Original-URL", "https://app.example.com/dashboard")
                    .header("X-Original-Method", "POST")
                    .header(header::PROXY_AUTHORIZATION, "Bearer opaque-token")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(response.headers(), "remote-user"), Some("john"));
    }

    #[tokio::test]
    async fn auth_request_without_credentials_is_unauthorized() {
        let response = app()
            .await
            .oneshot(
                Request::builder()
                    .uri("/api/authz/auth-request")
                    .header("X-Original-URL", "https://app.example.com/dashboard")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn verify_redirects_to_return_url_parameter() {
        let response = app()
            .await
            .oneshot(
                Request::builder()
                    .uri("/api/verify?rd=https%3A%2F%2Flogin.example.com%2F")
                    .header("X-Original-URL", "https://app.example.com/private")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::FOUND);
        let location = header_str(response.headers(), "location").expect("location");
        assert!(location.starts_with("https://login.example.com/?"));
        assert!(location.contains("rd=https%3A%2F%2Fapp.example.com%2Fprivate"));
    }

    #[tokio::test]
    async fn unknown_endpoint_is_not_found() {
        let response = app()
            .await
            .oneshot(
                forwarded("/api/authz/kerberos", "app.example.com")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    struct StalledSessions;

    #[async_trait]
    impl SessionProvider for StalledSessions {
        async fn load_session_by_cookie(
            &self,
            _id: &SessionId,
        ) -> Result<Option<UserSession>, SessionError> {
            std::future::pending().await
        }

        async fn refresh_identity(
            &self,
            _session: &SessionId,
            _identity: &Identity,
        ) -> Result<Option<Identity>, SessionError> {
            std::future::pending().await
        }

        async fn validate_credential(
            &self,
            _credential: &Credential,
        ) -> Result<Option<Identity>, SessionError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn timed_out_decision_is_service_unavailable() {
        let authz = AuthzBuilder::new()
            .with_authz_config(AuthzConfig {
                refresh_interval: RefreshInterval::Disabled,
                domains: vec![AuthzDomain::new(
                    "example.com",
                    Some(Url::parse("https://auth.example.com").expect("url")),
                )],
            })
            .with_implementation_forward_auth()
            .build();
        let policy = AccessControl::from_config(&Default::default()).expect("policy");
        let state = AppState::new(
            HashMap::from([("forward-auth".to_string(), Arc::new(authz))]),
            Arc::new(AuthzBuilder::new().with_implementation_legacy().build()),
            Providers::new(Arc::new(StalledSessions), Arc::new(policy)),
            Duration::from_millis(20),
        );

        let response = router(Arc::new(state))
            .oneshot(
                forwarded("/api/authz/forward-auth", "app.example.com")
                    .header(header::COOKIE, "gatehouse_session=abc")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
