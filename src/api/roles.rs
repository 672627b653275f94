// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::json;

use crate::{
    audit_log,
    auth::{Caller, Role},
    error::ApiError,
    models::{RoleListResponse, UpsertRoleRequest},
    state::AppState,
    storage::{AuditEvent, AuditEventType, RoleRepository},
};

/// List roles ordered by name.
#[utoipa::path(
    get,
    path = "/v1/roles",
    tag = "Roles",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Roles", body = RoleListResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Token lacks GET:/v1/roles")
    )
)]
pub async fn list_roles(State(state): State<AppState>) -> Result<Json<RoleListResponse>, ApiError> {
    let roles = RoleRepository::new(state.storage()).list_all()?;
    Ok(Json(RoleListResponse { roles }))
}

/// Create or replace a role's actors and permissions.
#[utoipa::path(
    put,
    path = "/v1/roles/{role_name}",
    tag = "Roles",
    security(("bearer_auth" = [])),
    params(("role_name" = String, Path, description = "Role name")),
    request_body = UpsertRoleRequest,
    responses(
        (status = 200, description = "Stored role", body = Role),
        (status = 400, description = "Invalid role name"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Token lacks PUT:/v1/roles/{role_name}")
    )
)]
pub async fn upsert_role(
    State(state): State<AppState>,
    caller: Caller,
    Path(role_name): Path<String>,
    Json(request): Json<UpsertRoleRequest>,
) -> Result<Json<Role>, ApiError> {
    let role_name = role_name.trim();
    if role_name.is_empty() {
        return Err(ApiError::bad_request("Role name must not be empty"));
    }

    let role = RoleRepository::new(state.storage()).upsert(Role {
        id: String::new(),
        role: role_name.to_string(),
        actors: request.actors,
        permissions: request.permissions,
    })?;

    audit_log!(
        state.storage(),
        AuditEvent::new(AuditEventType::RoleChanged)
            .with_actor(caller.token_id())
            .with_resource("role", &role.id)
            .with_details(json!({ "role": role.role, "actors": role.actors.len() }))
    );

    Ok(Json(role))
}

/// Delete a role by name.
#[utoipa::path(
    delete,
    path = "/v1/roles/{role_name}",
    tag = "Roles",
    security(("bearer_auth" = [])),
    params(("role_name" = String, Path, description = "Role name")),
    responses(
        (status = 200, description = "Deleted role", body = Role),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Token lacks DELETE:/v1/roles/{role_name}"),
        (status = 404, description = "Unknown role")
    )
)]
pub async fn delete_role(
    State(state): State<AppState>,
    caller: Caller,
    Path(role_name): Path<String>,
) -> Result<Json<Role>, ApiError> {
    let role = RoleRepository::new(state.storage()).delete_by_name(&role_name)?;

    audit_log!(
        state.storage(),
        AuditEvent::new(AuditEventType::RoleDeleted)
            .with_actor(caller.token_id())
            .with_resource("role", &role.id)
            .with_details(json!({ "role": role.role }))
    );

    Ok(Json(role))
}
