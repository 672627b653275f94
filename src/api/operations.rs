// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{NaiveDate, Utc};

use crate::{
    auth::RouteRegistry,
    error::ApiError,
    models::{AuditLogResponse, AuditQuery, RouteListResponse},
    state::AppState,
    storage::AuditRepository,
};

/// Guarded routes and the permission each one requires.
#[utoipa::path(
    get,
    path = "/v1/routes",
    tag = "Operations",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Route registry", body = RouteListResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Token lacks GET:/v1/routes")
    )
)]
pub async fn list_routes(Extension(registry): Extension<RouteRegistry>) -> Json<RouteListResponse> {
    Json(RouteListResponse {
        routes: registry.entries().to_vec(),
    })
}

/// Audit events for one day.
#[utoipa::path(
    get,
    path = "/v1/audit",
    tag = "Operations",
    security(("bearer_auth" = [])),
    params(AuditQuery),
    responses(
        (status = 200, description = "Audit events", body = AuditLogResponse),
        (status = 400, description = "Invalid date"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Token lacks GET:/v1/audit")
    )
)]
pub async fn audit_log(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditLogResponse>, ApiError> {
    let date = match query.date {
        Some(date) => {
            NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .map_err(|_| ApiError::bad_request("date must be YYYY-MM-DD"))?;
            date
        }
        None => Utc::now().format("%Y-%m-%d").to_string(),
    };

    let events = AuditRepository::new(state.storage()).read_events(&date)?;
    let total = events.len();

    Ok(Json(AuditLogResponse {
        date,
        events,
        total,
    }))
}
