// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Service access token administration.
//!
//! The signed token is returned by `POST /v1/tokens` and never again; the
//! list endpoint only returns stored records.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;

use crate::{
    audit_log,
    auth::{Caller, ServiceAccessToken},
    error::ApiError,
    models::{IssueTokenRequest, IssueTokenResponse, TokenListResponse},
    state::AppState,
    storage::{AuditEvent, AuditEventType},
};

/// Issue a service access token.
#[utoipa::path(
    post,
    path = "/v1/tokens",
    tag = "Tokens",
    security(("bearer_auth" = [])),
    request_body = IssueTokenRequest,
    responses(
        (status = 201, description = "Token issued", body = IssueTokenResponse),
        (status = 400, description = "Invalid name, expiry or permission pattern"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Token lacks POST:/v1/tokens")
    )
)]
pub async fn issue_token(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<IssueTokenRequest>,
) -> Result<(StatusCode, Json<IssueTokenResponse>), ApiError> {
    let issued = state
        .authority
        .issue(&request.name, request.expires_at, request.permissions)?;
    let record = issued.record;

    audit_log!(
        state.storage(),
        AuditEvent::new(AuditEventType::TokenIssued)
            .with_actor(caller.token_id())
            .with_resource("service_access_token", &record.token_id)
            .with_details(json!({
                "name": record.name,
                "expiresAt": record.expires_at,
                "permissions": record.permissions,
            }))
    );

    Ok((
        StatusCode::CREATED,
        Json(IssueTokenResponse {
            token_id: record.token_id,
            token: issued.token,
            name: record.name,
            expires_at: record.expires_at,
            permissions: record.permissions,
        }),
    ))
}

/// List issued tokens, newest first. Raw tokens are never included.
#[utoipa::path(
    get,
    path = "/v1/tokens",
    tag = "Tokens",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Token records", body = TokenListResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Token lacks GET:/v1/tokens")
    )
)]
pub async fn list_tokens(
    State(state): State<AppState>,
) -> Result<Json<TokenListResponse>, ApiError> {
    let tokens = state.authority.list()?;
    Ok(Json(TokenListResponse { tokens }))
}

/// Revoke a token. Revoking an already revoked token succeeds.
#[utoipa::path(
    delete,
    path = "/v1/tokens/{token_id}",
    tag = "Tokens",
    security(("bearer_auth" = [])),
    params(("token_id" = String, Path, description = "Token identifier")),
    responses(
        (status = 200, description = "Token revoked", body = ServiceAccessToken),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Token lacks DELETE:/v1/tokens/{token_id}"),
        (status = 404, description = "Unknown token")
    )
)]
pub async fn revoke_token(
    State(state): State<AppState>,
    caller: Caller,
    Path(token_id): Path<String>,
) -> Result<Json<ServiceAccessToken>, ApiError> {
    let record = state.authority.revoke(&token_id)?;

    audit_log!(
        state.storage(),
        AuditEvent::new(AuditEventType::TokenRevoked)
            .with_actor(caller.token_id())
            .with_resource("service_access_token", &record.token_id)
    );

    Ok(Json(record))
}
