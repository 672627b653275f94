// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authorizing Proxy
//!
//! Forwards browser requests from the admin console to the backend API.
//!
//! ## Pipeline
//!
//! 1. Exactly one `url` target, parseable as an absolute http(s) URL → else 400
//! 2. Method must be `GET`, `POST`, `PUT` or `DELETE` → else 405
//! 3. Caller headers are copied; `Authorization` is replaced by the service
//!    access token so the user's session token never reaches the backend
//! 4. With end-user authorization enabled:
//!    - a non-errored session is required
//!    - group claims come from the [`UserInfoCache`], filled from the
//!      user-info endpoint on a miss
//!    - the admin role must admit the user or one of its groups
//!
//!    Every failure here is a redirect to sign-in, never an error status.
//! 5. The upstream response is relayed: 204/empty as an empty body, JSON
//!    re-encoded, anything else as text. Transport failures become 500.
//!
//! A missing admin role, or one with no actors, grants access with a warning
//! so a fresh deployment cannot lock its operators out.

pub mod forwarder;

use std::sync::Arc;

use axum::{
    body::Bytes,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use chrono::Duration;
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::RoleRegistry;
use crate::clock::Clock;
use crate::session::{SessionToken, UserClaims, UserInfo, UserInfoCache, UserInfoSource};

pub use forwarder::{ForwardError, Forwarder, ReqwestForwarder, UpstreamRequest, UpstreamResponse};

/// Headers never copied to the upstream request.
///
/// `accept-encoding` is dropped because upstream bodies are decoded as
/// JSON or text and relayed without their `content-encoding`.
const STRIPPED_HEADERS: &[&str] = &[
    "accept-encoding",
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
    "cookie",
    "authorization",
];

/// Proxy settings taken from the gateway configuration.
#[derive(Debug, Clone)]
pub struct ProxySettings {
    pub authorization_enabled: bool,
    pub admin_role_name: String,
    /// Service access token presented to the backend.
    pub service_access_token: Option<String>,
    pub sign_in_url: String,
    /// Upper bound on user-info cache entries.
    pub userinfo_ttl: Duration,
}

/// One browser request to forward.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Every `url` query value the caller sent.
    pub targets: Vec<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyRequest {
    /// Reject a bad target or method before any session or upstream work.
    pub fn validate(&self) -> Result<(), ProxyError> {
        self.preflight().map(|_| ())
    }

    /// The single target and whether the method carries a body.
    fn preflight(&self) -> Result<(Url, bool), ProxyError> {
        let target = single_target(&self.targets)?;
        let carries_body = match self.method {
            Method::GET | Method::DELETE => false,
            Method::POST | Method::PUT => true,
            ref other => return Err(ProxyError::MethodNotAllowed(other.clone())),
        };
        Ok((target, carries_body))
    }
}

/// Relayed upstream body.
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyBody {
    Empty,
    Json(serde_json::Value),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub body: ProxyBody,
}

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("{0}")]
    Malformed(String),

    #[error("method {0} is not supported by the proxy")]
    MethodNotAllowed(Method),

    #[error("sign-in required")]
    SignInRequired { sign_in_url: String },

    #[error("{0}")]
    Upstream(String),
}

#[derive(Serialize)]
struct ProxyErrorBody {
    error: String,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match &self {
            ProxyError::SignInRequired { sign_in_url } => {
                return Redirect::to(sign_in_url).into_response();
            }
            ProxyError::Malformed(_) => StatusCode::BAD_REQUEST,
            ProxyError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ProxyErrorBody {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        match self.body {
            ProxyBody::Empty => self.status.into_response(),
            ProxyBody::Json(value) => (self.status, Json(value)).into_response(),
            ProxyBody::Text(text) => (self.status, text).into_response(),
        }
    }
}

/// Authorizes the human caller and forwards to the backend.
pub struct AuthorizingProxy {
    settings: ProxySettings,
    roles: Arc<dyn RoleRegistry>,
    userinfo_cache: Arc<UserInfoCache>,
    userinfo_source: Option<Arc<dyn UserInfoSource>>,
    forwarder: Arc<dyn Forwarder>,
    clock: Arc<dyn Clock>,
}

impl AuthorizingProxy {
    pub fn new(
        settings: ProxySettings,
        roles: Arc<dyn RoleRegistry>,
        userinfo_cache: Arc<UserInfoCache>,
        userinfo_source: Option<Arc<dyn UserInfoSource>>,
        forwarder: Arc<dyn Forwarder>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings,
            roles,
            userinfo_cache,
            userinfo_source,
            forwarder,
            clock,
        }
    }

    pub fn settings(&self) -> &ProxySettings {
        &self.settings
    }

    pub async fn forward(
        &self,
        request: ProxyRequest,
        session: Option<&SessionToken>,
    ) -> Result<ProxyResponse, ProxyError> {
        let (target, carries_body) = request.preflight()?;

        let mut headers = self.outbound_headers(&request.headers)?;

        if self.settings.authorization_enabled {
            self.authorize(session).await?;
        }

        let body = if carries_body {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(request.body.len()));
            Some(request.body)
        } else {
            None
        };

        debug!(method = %request.method, target = %target, "Forwarding proxied request");
        let upstream = self
            .forwarder
            .send(UpstreamRequest {
                method: request.method,
                url: target.to_string(),
                headers,
                body,
            })
            .await
            .map_err(|e| ProxyError::Upstream(e.to_string()))?;

        relay(upstream)
    }

    fn outbound_headers(&self, incoming: &HeaderMap) -> Result<HeaderMap, ProxyError> {
        let mut headers = incoming.clone();
        for name in STRIPPED_HEADERS {
            headers.remove(*name);
        }

        if let Some(token) = &self.settings.service_access_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                ProxyError::Upstream("service access token is not a valid header".to_string())
            })?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    async fn authorize(&self, session: Option<&SessionToken>) -> Result<(), ProxyError> {
        let session = match session {
            Some(session) if !session.is_errored() => session,
            Some(_) => {
                debug!("Proxy call with errored session");
                return Err(self.sign_in());
            }
            None => {
                debug!("Proxy call without session");
                return Err(self.sign_in());
            }
        };

        let info = self.user_info(session).await?;

        let role = match self.roles.find_by_name(&self.settings.admin_role_name).await {
            Ok(Some(role)) => role,
            Ok(None) => {
                warn!(
                    role = %self.settings.admin_role_name,
                    "Admin role not found, allowing proxy access"
                );
                return Ok(());
            }
            Err(e) => {
                warn!(
                    role = %self.settings.admin_role_name,
                    error = %e,
                    "Admin role lookup failed, denying proxy access"
                );
                return Err(self.sign_in());
            }
        };

        if role.actors.is_empty() {
            warn!(role = %role.role, "Admin role has no actors, allowing proxy access");
            return Ok(());
        }

        if role.admits(&info.username, &info.claims.groups) {
            Ok(())
        } else {
            info!(
                username = %info.username,
                role = %role.role,
                "User is not an admin role actor, redirecting to sign-in"
            );
            Err(self.sign_in())
        }
    }

    /// Cached user info, fetched and cached on a miss. The entry never
    /// outlives the session's access token.
    async fn user_info(&self, session: &SessionToken) -> Result<UserInfo, ProxyError> {
        if let Some(info) = self.userinfo_cache.get(&session.access_token) {
            return Ok(info);
        }

        let Some(source) = &self.userinfo_source else {
            warn!("No user-info endpoint configured, cannot resolve caller claims");
            return Err(self.sign_in());
        };

        let profile = source.fetch(&session.access_token).await.map_err(|e| {
            warn!(error = %e, "User-info lookup failed");
            self.sign_in()
        })?;

        let ttl_bound = self.clock.now_ms() + self.settings.userinfo_ttl.num_milliseconds();
        let info = UserInfo {
            access_token: session.access_token.clone(),
            expires_at: ttl_bound.min(session.access_token_expires),
            claims: UserClaims {
                groups: profile.groups,
            },
            username: profile.username,
        };
        self.userinfo_cache.set(info.clone());
        Ok(info)
    }

    fn sign_in(&self) -> ProxyError {
        ProxyError::SignInRequired {
            sign_in_url: self.settings.sign_in_url.clone(),
        }
    }
}

fn single_target(targets: &[String]) -> Result<Url, ProxyError> {
    let raw = match targets {
        [] => return Err(ProxyError::Malformed("missing url parameter".to_string())),
        [one] => one,
        _ => return Err(ProxyError::Malformed("url parameter given more than once".to_string())),
    };

    let url = Url::parse(raw).map_err(|e| ProxyError::Malformed(format!("invalid url: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ProxyError::Malformed(format!("unsupported url scheme: {other}"))),
    }
}

fn relay(upstream: UpstreamResponse) -> Result<ProxyResponse, ProxyError> {
    let status = upstream.status;
    if status == StatusCode::NO_CONTENT || upstream.body.is_empty() {
        return Ok(ProxyResponse {
            status,
            body: ProxyBody::Empty,
        });
    }

    let is_json = upstream
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("application/json"));

    let body = if is_json {
        let value = serde_json::from_slice(&upstream.body)
            .map_err(|e| ProxyError::Upstream(format!("invalid JSON from upstream: {e}")))?;
        ProxyBody::Json(value)
    } else {
        ProxyBody::Text(String::from_utf8_lossy(&upstream.body).into_owned())
    };

    Ok(ProxyResponse { status, body })
}
