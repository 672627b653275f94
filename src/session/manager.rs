// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OIDC session refresh.
//!
//! ```text
//! Unauthenticated ──sign_in──▶ Authenticated(fresh)
//!                                   │ now ≥ expires - margin
//!                                   ▼
//!                              Refreshing ──ok──▶ Authenticated(fresh)
//!                                   │
//!                                   └──fail──▶ Errored(RefreshAccessTokenError)
//! ```
//!
//! `Errored` is sticky: the manager never retries on its own and the caller
//! must send the user through sign-in again. Concurrent uses of one session
//! each decide independently whether to refresh; duplicate refresh calls are
//! not deduplicated.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Duration;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::token::{SessionError, SessionToken, SessionUser};
use crate::clock::Clock;

/// Client credentials presented to the IdP token endpoint.
#[derive(Debug, Clone)]
pub struct RefreshCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
}

/// Tokens returned by a successful grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum IdpError {
    #[error("identity provider request failed: {0}")]
    Transport(String),

    #[error("identity provider returned HTTP {0}")]
    Status(u16),

    #[error("identity provider response has no access_token")]
    MissingAccessToken,

    #[error("invalid identity provider response: {0}")]
    InvalidResponse(String),
}

/// Token endpoint of the identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `refresh_token` grant.
    async fn refresh(
        &self,
        token_endpoint_url: &str,
        refresh_token: &str,
        credentials: &RefreshCredentials,
    ) -> Result<TokenGrant, IdpError>;

    /// `authorization_code` grant used at sign-in.
    async fn exchange_code(
        &self,
        token_endpoint_url: &str,
        code: &str,
        redirect_uri: &str,
        credentials: &RefreshCredentials,
    ) -> Result<TokenGrant, IdpError>;
}

#[derive(Deserialize)]
struct TokenEndpointResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// OAuth2 token endpoint client (form-encoded grants, JSON responses).
pub struct OidcTokenClient {
    client: reqwest::Client,
}

impl OidcTokenClient {
    pub fn new(timeout: StdDuration) -> Result<Self, IdpError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdpError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    async fn grant(&self, url: &str, form: &[(&str, &str)]) -> Result<TokenGrant, IdpError> {
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| IdpError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IdpError::Status(response.status().as_u16()));
        }

        let body: TokenEndpointResponse = response
            .json()
            .await
            .map_err(|e| IdpError::InvalidResponse(e.to_string()))?;

        let access_token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(IdpError::MissingAccessToken)?;

        Ok(TokenGrant {
            access_token,
            refresh_token: body.refresh_token,
        })
    }
}

#[async_trait]
impl IdentityProvider for OidcTokenClient {
    async fn refresh(
        &self,
        token_endpoint_url: &str,
        refresh_token: &str,
        credentials: &RefreshCredentials,
    ) -> Result<TokenGrant, IdpError> {
        self.grant(
            token_endpoint_url,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", &credentials.client_id),
                ("client_secret", &credentials.client_secret),
                ("scope", &credentials.scope),
            ],
        )
        .await
    }

    async fn exchange_code(
        &self,
        token_endpoint_url: &str,
        code: &str,
        redirect_uri: &str,
        credentials: &RefreshCredentials,
    ) -> Result<TokenGrant, IdpError> {
        self.grant(
            token_endpoint_url,
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", &credentials.client_id),
                ("client_secret", &credentials.client_secret),
            ],
        )
        .await
    }
}

/// Keeps OIDC sessions fresh.
pub struct SessionTokenManager {
    idp: Arc<dyn IdentityProvider>,
    credentials: RefreshCredentials,
    clock: Arc<dyn Clock>,
    lifetime: Duration,
    margin: Duration,
}

impl SessionTokenManager {
    pub fn new(
        idp: Arc<dyn IdentityProvider>,
        credentials: RefreshCredentials,
        clock: Arc<dyn Clock>,
        lifetime: Duration,
        margin: Duration,
    ) -> Self {
        Self {
            idp,
            credentials,
            clock,
            lifetime,
            margin,
        }
    }

    pub fn identity_provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.idp
    }

    pub fn credentials(&self) -> &RefreshCredentials {
        &self.credentials
    }

    /// Create the session for a completed sign-in.
    pub fn sign_in(
        &self,
        grant: TokenGrant,
        token_endpoint_url: impl Into<String>,
        user: SessionUser,
    ) -> SessionToken {
        info!(username = %user.username, "Session signed in");
        SessionToken {
            access_token: grant.access_token,
            access_token_expires: self.expires_from_now(),
            refresh_token: grant.refresh_token,
            token_endpoint_url: token_endpoint_url.into(),
            user,
            error: None,
        }
    }

    /// Return a session that is usable now, refreshing it if it is inside
    /// the refresh margin. Refresh failure is returned as an errored
    /// session, not as an error.
    pub async fn ensure_fresh(&self, session: SessionToken) -> SessionToken {
        if session.is_errored() {
            return session;
        }

        let now_ms = self.clock.now_ms();
        if now_ms < session.access_token_expires - self.margin.num_milliseconds() {
            return session;
        }

        let Some(refresh_token) = session.refresh_token.as_deref() else {
            warn!(username = %session.user.username, "Session expiring without refresh token");
            return errored(session);
        };

        debug!(username = %session.user.username, "Refreshing session access token");
        match self
            .idp
            .refresh(&session.token_endpoint_url, refresh_token, &self.credentials)
            .await
        {
            Ok(grant) => SessionToken {
                access_token: grant.access_token,
                access_token_expires: self.expires_from_now(),
                refresh_token: grant.refresh_token.or(session.refresh_token),
                token_endpoint_url: session.token_endpoint_url,
                user: session.user,
                error: None,
            },
            Err(e) => {
                warn!(
                    username = %session.user.username,
                    error = %e,
                    "Session refresh failed"
                );
                errored(session)
            }
        }
    }

    fn expires_from_now(&self) -> i64 {
        self.clock.now_ms() + self.lifetime.num_milliseconds()
    }
}

fn errored(session: SessionToken) -> SessionToken {
    SessionToken {
        error: Some(SessionError::RefreshAccessTokenError),
        ..session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FakeIdp {
        calls: AtomicUsize,
        result: Mutex<Result<TokenGrant, u16>>,
    }

    impl FakeIdp {
        fn returning(result: Result<TokenGrant, u16>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                result: Mutex::new(result),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeIdp {
        async fn refresh(
            &self,
            _url: &str,
            _refresh_token: &str,
            _credentials: &RefreshCredentials,
        ) -> Result<TokenGrant, IdpError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.lock().unwrap().clone().map_err(IdpError::Status)
        }

        async fn exchange_code(
            &self,
            _url: &str,
            _code: &str,
            _redirect_uri: &str,
            _credentials: &RefreshCredentials,
        ) -> Result<TokenGrant, IdpError> {
            unreachable!("not used")
        }
    }

    fn credentials() -> RefreshCredentials {
        RefreshCredentials {
            client_id: "console".to_string(),
            client_secret: "shh".to_string(),
            scope: "openid offline_access".to_string(),
        }
    }

    fn user() -> SessionUser {
        SessionUser {
            username: "alice".to_string(),
            email: None,
        }
    }

    fn grant(access: &str, refresh: Option<&str>) -> TokenGrant {
        TokenGrant {
            access_token: access.to_string(),
            refresh_token: refresh.map(str::to_string),
        }
    }

    fn manager(idp: Arc<FakeIdp>, clock: Arc<ManualClock>) -> SessionTokenManager {
        SessionTokenManager::new(
            idp,
            credentials(),
            clock,
            Duration::milliseconds(10_000),
            Duration::milliseconds(3_000),
        )
    }

    #[tokio::test]
    async fn sign_in_sets_expiry_from_server_clock() {
        let clock = Arc::new(ManualClock::starting_now());
        let manager = manager(FakeIdp::returning(Err(500)), clock.clone());

        let session = manager.sign_in(grant("a1", Some("r1")), "https://idp/token", user());
        assert_eq!(session.access_token_expires, clock.now_ms() + 10_000);
        assert!(!session.is_errored());
    }

    #[tokio::test]
    async fn refresh_happens_only_inside_margin() {
        let clock = Arc::new(ManualClock::starting_now());
        let idp = FakeIdp::returning(Ok(grant("a2", None)));
        let manager = manager(idp.clone(), clock.clone());
        let session = manager.sign_in(grant("a1", Some("r1")), "https://idp/token", user());

        clock.advance(Duration::milliseconds(6_000));
        let session = manager.ensure_fresh(session).await;
        assert_eq!(idp.calls(), 0);
        assert_eq!(session.access_token, "a1");

        clock.advance(Duration::milliseconds(2_000));
        let session = manager.ensure_fresh(session).await;
        assert_eq!(idp.calls(), 1);
        assert_eq!(session.access_token, "a2");
        assert_eq!(session.access_token_expires, clock.now_ms() + 10_000);
        // IdP did not rotate the refresh token
        assert_eq!(session.refresh_token.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn rotated_refresh_token_replaces_old_one() {
        let clock = Arc::new(ManualClock::starting_now());
        let idp = FakeIdp::returning(Ok(grant("a2", Some("r2"))));
        let manager = manager(idp, clock.clone());
        let session = manager.sign_in(grant("a1", Some("r1")), "https://idp/token", user());

        clock.advance(Duration::milliseconds(9_000));
        let session = manager.ensure_fresh(session).await;
        assert_eq!(session.refresh_token.as_deref(), Some("r2"));
    }

    #[tokio::test]
    async fn failed_refresh_is_sticky() {
        let clock = Arc::new(ManualClock::starting_now());
        let idp = FakeIdp::returning(Err(400));
        let manager = manager(idp.clone(), clock.clone());
        let session = manager.sign_in(grant("a1", Some("r1")), "https://idp/token", user());

        clock.advance(Duration::milliseconds(8_000));
        let session = manager.ensure_fresh(session).await;
        assert_eq!(session.error, Some(SessionError::RefreshAccessTokenError));
        assert_eq!(idp.calls(), 1);

        *idp.result.lock().unwrap() = Ok(grant("a3", None));
        let session = manager.ensure_fresh(session).await;
        assert!(session.is_errored());
        assert_eq!(idp.calls(), 1);
    }

    #[tokio::test]
    async fn missing_refresh_token_errors_without_call() {
        let clock = Arc::new(ManualClock::starting_now());
        let idp = FakeIdp::returning(Ok(grant("a2", None)));
        let manager = manager(idp.clone(), clock.clone());
        let session = manager.sign_in(grant("a1", None), "https://idp/token", user());

        clock.advance(Duration::milliseconds(8_000));
        let session = manager.ensure_fresh(session).await;
        assert!(session.is_errored());
        assert_eq!(idp.calls(), 0);
    }

    #[tokio::test]
    async fn oidc_client_posts_refresh_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=r1"))
            .and(body_string_contains("client_id=console"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh",
                "token_type": "Bearer",
                "expires_in": 300
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OidcTokenClient::new(StdDuration::from_secs(5)).unwrap();
        let grant = client
            .refresh(&format!("{}/token", server.uri()), "r1", &credentials())
            .await
            .unwrap();
        assert_eq!(grant.access_token, "fresh");
        assert_eq!(grant.refresh_token, None);
    }

    #[tokio::test]
    async fn oidc_client_rejects_missing_access_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;

        let client = OidcTokenClient::new(StdDuration::from_secs(5)).unwrap();
        let err = client
            .refresh(&format!("{}/token", server.uri()), "r1", &credentials())
            .await
            .unwrap_err();
        assert!(matches!(err, IdpError::MissingAccessToken));
    }

    #[tokio::test]
    async fn oidc_client_maps_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = OidcTokenClient::new(StdDuration::from_secs(5)).unwrap();
        let err = client
            .exchange_code(
                &format!("{}/token", server.uri()),
                "c",
                "https://app/cb",
                &credentials(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, IdpError::Status(401)));
    }
}
