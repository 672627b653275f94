// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::Method,
    routing::{any, get, post},
    Extension, Router,
};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    api::health::{HealthChecks, HealthResponse, ReadyResponse},
    auth::{Actor, ActorType, GuardedRouter, Role, RolePermission, RouteEntry, ServiceAccessToken},
    models::{
        AuditLogResponse, IssueTokenRequest, IssueTokenResponse, RoleListResponse,
        RouteListResponse, TokenListResponse, UpsertRoleRequest,
    },
    state::AppState,
    storage::{AuditEvent, AuditEventType},
};

pub mod health;
pub mod operations;
pub mod proxy;
pub mod roles;
pub mod session;
pub mod tokens;

/// Build the gateway router.
///
/// Every `/v1` route goes through [`GuardedRouter`], so its permission is
/// derived from the method and path template and listed by `/v1/routes`.
pub fn router(state: AppState) -> Router {
    let (v1_routes, registry) = GuardedRouter::new(state.guard.clone())
        .route(Method::GET, "/v1/tokens", tokens::list_tokens)
        .route(Method::POST, "/v1/tokens", tokens::issue_token)
        .route(Method::DELETE, "/v1/tokens/{token_id}", tokens::revoke_token)
        .route(Method::GET, "/v1/roles", roles::list_roles)
        .route(Method::PUT, "/v1/roles/{role_name}", roles::upsert_role)
        .route(Method::DELETE, "/v1/roles/{role_name}", roles::delete_role)
        .route(Method::GET, "/v1/routes", operations::list_routes)
        .route(Method::GET, "/v1/audit", operations::audit_log)
        .finish();

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/auth/sign-in", get(session::sign_in))
        .route("/auth/callback", get(session::callback))
        .route("/auth/sign-out", post(session::sign_out))
        .route("/proxy", any(proxy::proxy))
        .merge(v1_routes)
        .layer(Extension(registry))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        tokens::issue_token,
        tokens::list_tokens,
        tokens::revoke_token,
        roles::list_roles,
        roles::upsert_role,
        roles::delete_role,
        operations::list_routes,
        operations::audit_log,
        session::sign_in,
        session::callback,
        session::sign_out,
        proxy::proxy
    ),
    components(
        schemas(
            ReadyResponse,
            HealthChecks,
            HealthResponse,
            ServiceAccessToken,
            IssueTokenRequest,
            IssueTokenResponse,
            TokenListResponse,
            Role,
            Actor,
            ActorType,
            RolePermission,
            UpsertRoleRequest,
            RoleListResponse,
            RouteEntry,
            RouteListResponse,
            AuditEvent,
            AuditEventType,
            AuditLogResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Tokens", description = "Service access token administration"),
        (name = "Roles", description = "Role registry maintenance"),
        (name = "Operations", description = "Route registry and audit log"),
        (name = "Session", description = "Browser sign-in with the identity provider"),
        (name = "Proxy", description = "Authorizing proxy to the backend API")
    )
)]
struct ApiDoc;
