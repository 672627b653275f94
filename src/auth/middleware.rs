// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Route guard middleware.
//!
//! Every backend route is registered with the permission it requires (see
//! [`super::routes::GuardedRouter`]). The guard runs before the handler:
//!
//! 1. No `Authorization: Bearer <token>` header → 401
//! 2. Token malformed, badly signed or expired → 401
//! 3. Token valid but its patterns do not grant `METHOD:/path` → 403
//! 4. Otherwise the [`ServicePrincipal`] is added to request extensions and
//!    the handler runs.
//!
//! A disabled guard passes every request through unchanged, keeping the
//! route surface identical for local development.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use super::permissions::is_granted;
use super::tokens::AccessTokenAuthority;
use super::{AuthError, ServicePrincipal};

/// Authenticates and authorizes service tokens on backend routes.
#[derive(Clone)]
pub struct RouteGuard {
    authority: Arc<AccessTokenAuthority>,
    enabled: bool,
}

impl RouteGuard {
    pub fn new(authority: Arc<AccessTokenAuthority>, enabled: bool) -> Self {
        Self { authority, enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Decide a request. `Ok(None)` means the guard is disabled.
    pub fn authorize(
        &self,
        headers: &HeaderMap,
        permission: &str,
    ) -> Result<Option<ServicePrincipal>, AuthError> {
        if !self.enabled {
            return Ok(None);
        }

        let token = bearer_token(headers)?;
        let claims = self.authority.verify(token)?;

        if !is_granted(permission, &claims.permissions) {
            debug!(
                token_id = %claims.token_id,
                permission = %permission,
                "Service token lacks route permission"
            );
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(Some(ServicePrincipal::from_claims(claims)))
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_str = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or(AuthError::InvalidAuthHeader)?;

    if token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }
    Ok(token)
}

/// Per-route guard state: the guard plus the route's required permission.
#[derive(Clone)]
pub struct GuardContext {
    pub guard: RouteGuard,
    pub permission: Arc<str>,
}

/// Middleware function installed on every guarded route.
pub async fn route_guard(
    State(ctx): State<GuardContext>,
    mut request: Request,
    next: Next,
) -> Response {
    match ctx.guard.authorize(request.headers(), &ctx.permission) {
        Ok(principal) => {
            if let Some(principal) = principal {
                request.extensions_mut().insert(principal);
            }
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}
