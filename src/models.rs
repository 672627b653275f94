// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the `/v1` administration API. Persisted
//! entities (`ServiceAccessToken`, `Role`, `AuditEvent`) are serialized as
//! they are stored; the types here wrap them for transport.
//!
//! ## Model Categories
//!
//! - **Tokens**: issuing and listing service access tokens
//! - **Roles**: role registry maintenance
//! - **Operations**: route registry and audit log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::{Actor, Role, RolePermission, RouteEntry, ServiceAccessToken};
use crate::storage::AuditEvent;

// =============================================================================
// Tokens
// =============================================================================

/// Request to issue a service access token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueTokenRequest {
    /// Human-readable label.
    pub name: String,
    /// Expiry, must be in the future.
    pub expires_at: DateTime<Utc>,
    /// Permission patterns, e.g. `GET:*` or `*:/v1/*`.
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Issued token. `token` is shown here and nowhere else.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueTokenResponse {
    pub token_id: String,
    pub token: String,
    pub name: String,
    pub expires_at: DateTime<Utc>,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenListResponse {
    pub tokens: Vec<ServiceAccessToken>,
}

// =============================================================================
// Roles
// =============================================================================

/// Body of `PUT /v1/roles/{role_name}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpsertRoleRequest {
    #[serde(default)]
    pub actors: Vec<Actor>,
    #[serde(default)]
    pub permissions: Vec<RolePermission>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleListResponse {
    pub roles: Vec<Role>,
}

// =============================================================================
// Operations
// =============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RouteListResponse {
    pub routes: Vec<RouteEntry>,
}

/// Query parameters for `GET /v1/audit`.
#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditQuery {
    /// Day to read (YYYY-MM-DD). Defaults to today (UTC).
    pub date: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogResponse {
    pub date: String,
    pub events: Vec<AuditEvent>,
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_request_uses_camel_case() {
        let req: IssueTokenRequest = serde_json::from_value(serde_json::json!({
            "name": "ci",
            "expiresAt": "2030-01-01T00:00:00Z",
            "permissions": ["GET:*"]
        }))
        .unwrap();
        assert_eq!(req.name, "ci");
        assert_eq!(req.permissions, vec!["GET:*"]);
    }

    #[test]
    fn upsert_role_reads_actor_types() {
        let req: UpsertRoleRequest = serde_json::from_value(serde_json::json!({
            "actors": [{"name": "Admins", "type": "Group"}, {"name": "bob", "type": "User"}]
        }))
        .unwrap();
        assert_eq!(req.actors, vec![Actor::group("Admins"), Actor::user("bob")]);
        assert!(req.permissions.is_empty());
    }
}
