// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::{HeaderMap, Method},
};

use crate::{
    proxy::{ProxyError, ProxyRequest, ProxyResponse},
    session::{cookies::read_cookie, cookies::SESSION_COOKIE_NAME, SessionToken},
    state::AppState,
};

/// Forward a console request to the backend URL given in `url`.
#[utoipa::path(
    get,
    path = "/proxy",
    tag = "Proxy",
    params(("url" = String, Query, description = "Absolute backend URL, exactly once")),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Relayed backend response"),
        (status = 303, description = "Sign-in required"),
        (status = 400, description = "Missing, repeated or invalid url"),
        (status = 405, description = "Method not supported by the proxy"),
        (status = 500, description = "Backend unreachable or returned invalid JSON")
    )
)]
pub async fn proxy(
    State(state): State<AppState>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ProxyResponse, ProxyError> {
    let targets = query
        .as_deref()
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .filter(|(key, _)| key == "url")
                .map(|(_, value)| value.into_owned())
                .collect()
        })
        .unwrap_or_default();

    let request = ProxyRequest {
        method,
        targets,
        headers,
        body,
    };
    request.validate()?;

    let session = current_session(&state, &request.headers).await;
    state.proxy.forward(request, session.as_ref()).await
}

/// Load the caller's session and refresh it if it is about to expire.
async fn current_session(state: &AppState, headers: &HeaderMap) -> Option<SessionToken> {
    let id = read_cookie(headers, SESSION_COOKIE_NAME)?;
    let session = state.sessions.get(&id).await?;

    let Some(oidc) = state.oidc.as_ref() else {
        return Some(session);
    };

    let previous_token = session.access_token.clone();
    let fresh = oidc.manager.ensure_fresh(session).await;
    if fresh.access_token != previous_token || fresh.is_errored() {
        state.userinfo_cache.remove(&previous_token);
    }
    state.sessions.replace(&id, fresh.clone()).await;
    Some(fresh)
}
