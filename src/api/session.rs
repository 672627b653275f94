// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Browser sign-in against the identity provider (authorization code flow).
//!
//! `/auth/sign-in` redirects to the IdP with a random `state` that is also
//! stored in a short-lived cookie. `/auth/callback` checks the two match,
//! exchanges the code, resolves the user and opens a server-side session.

use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use base64ct::{Base64UrlUnpadded, Encoding};
use cookie::Cookie;
use ring::rand::{SecureRandom, SystemRandom};
use serde::Deserialize;
use tracing::{info, warn};
use utoipa::IntoParams;

use crate::{
    error::ApiError,
    session::{
        cookies::{header_value, read_cookie, SESSION_COOKIE_NAME, STATE_COOKIE_NAME},
        CookieSettings, SessionUser, UserClaims, UserInfo,
    },
    state::{AppState, OidcState},
};

const STATE_BYTES: usize = 16;

/// Query parameters the IdP appends to the redirect URI.
#[derive(Debug, Deserialize, IntoParams)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the IdP when the user denied consent or sign-in failed.
    pub error: Option<String>,
}

/// Start sign-in by redirecting to the IdP authorization endpoint.
#[utoipa::path(
    get,
    path = "/auth/sign-in",
    tag = "Session",
    responses(
        (status = 303, description = "Redirect to the identity provider"),
        (status = 503, description = "OIDC not configured")
    )
)]
pub async fn sign_in(State(state): State<AppState>) -> Result<Response, ApiError> {
    let oidc = oidc(&state)?;

    let oauth_state = random_state()?;
    let mut url = oidc.config.authorization_url.clone();
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &oidc.config.client_id)
        .append_pair("redirect_uri", oidc.config.redirect_uri.as_str())
        .append_pair("scope", &oidc.config.scope)
        .append_pair("state", &oauth_state);

    let cookies = cookie_settings(&state);
    Ok(with_cookies(
        Redirect::to(url.as_str()).into_response(),
        &[cookies.state(&oauth_state)],
    ))
}

/// Complete sign-in and open a session.
#[utoipa::path(
    get,
    path = "/auth/callback",
    tag = "Session",
    params(CallbackQuery),
    responses(
        (status = 303, description = "Signed in, redirect to /"),
        (status = 400, description = "Missing code or state mismatch"),
        (status = 502, description = "Identity provider rejected the code"),
        (status = 503, description = "OIDC not configured")
    )
)]
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, ApiError> {
    let oidc = oidc(&state)?;

    if let Some(error) = query.error {
        warn!(%error, "Identity provider returned an error to the callback");
        return Err(ApiError::bad_request(format!("sign-in failed: {error}")));
    }
    let code = query
        .code
        .ok_or_else(|| ApiError::bad_request("missing code"))?;
    let expected = read_cookie(&headers, STATE_COOKIE_NAME);
    if expected.is_none() || expected != query.state {
        warn!("Sign-in callback state does not match");
        return Err(ApiError::bad_request("state mismatch"));
    }

    let grant = oidc
        .manager
        .identity_provider()
        .exchange_code(
            oidc.config.token_url.as_str(),
            &code,
            oidc.config.redirect_uri.as_str(),
            oidc.manager.credentials(),
        )
        .await
        .map_err(|e| {
            warn!(error = %e, "Authorization code exchange failed");
            ApiError::new(StatusCode::BAD_GATEWAY, "identity provider rejected the sign-in")
        })?;

    let source = state
        .userinfo_source
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("user-info endpoint not configured"))?;
    let profile = source.fetch(&grant.access_token).await.map_err(|e| {
        warn!(error = %e, "User-info lookup after sign-in failed");
        ApiError::new(StatusCode::BAD_GATEWAY, "identity provider user-info failed")
    })?;

    let session = oidc.manager.sign_in(
        grant,
        oidc.config.token_url.as_str(),
        SessionUser {
            username: profile.username.clone(),
            email: profile.email,
        },
    );

    let ttl_ms = state.proxy.settings().userinfo_ttl.num_milliseconds();
    state.userinfo_cache.set(UserInfo {
        access_token: session.access_token.clone(),
        expires_at: state
            .clock
            .now_ms()
            .saturating_add(ttl_ms)
            .min(session.access_token_expires),
        claims: UserClaims {
            groups: profile.groups,
        },
        username: profile.username,
    });

    let session_id = state
        .sessions
        .create(session)
        .await
        .map_err(ApiError::internal)?;

    let cookies = cookie_settings(&state);
    info!("Browser session opened");
    Ok(with_cookies(
        Redirect::to("/").into_response(),
        &[
            cookies.session(&session_id),
            cookies.clear(STATE_COOKIE_NAME),
        ],
    ))
}

/// End the browser session.
#[utoipa::path(
    post,
    path = "/auth/sign-out",
    tag = "Session",
    responses((status = 204, description = "Signed out"))
)]
pub async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(id) = read_cookie(&headers, SESSION_COOKIE_NAME) {
        if let Some(session) = state.sessions.remove(&id).await {
            state.userinfo_cache.remove(&session.access_token);
            info!(username = %session.user.username, "Session signed out");
        }
    }

    with_cookies(
        StatusCode::NO_CONTENT.into_response(),
        &[cookie_settings(&state).clear(SESSION_COOKIE_NAME)],
    )
}

fn oidc(state: &AppState) -> Result<&OidcState, ApiError> {
    state
        .oidc
        .as_deref()
        .ok_or_else(|| ApiError::service_unavailable("OIDC sign-in is not configured"))
}

fn cookie_settings(state: &AppState) -> CookieSettings {
    CookieSettings {
        secure: state.config.session_cookie_secure,
    }
}

fn random_state() -> Result<String, ApiError> {
    let mut bytes = [0u8; STATE_BYTES];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| ApiError::internal("failed to generate sign-in state"))?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

fn with_cookies(mut response: Response, cookies: &[Cookie<'static>]) -> Response {
    for cookie in cookies {
        if let Some(value) = header_value(cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
    response
}
