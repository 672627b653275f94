// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for the service principal set by the route guard.
//!
//! ```rust,ignore
//! async fn my_handler(Caller(principal): Caller) -> impl IntoResponse {
//!     // principal is None when the guard is disabled
//! }
//! ```

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

use super::ServicePrincipal;

/// Principal of a guarded route, or `None` when authorization is disabled.
pub struct Caller(pub Option<ServicePrincipal>);

impl Caller {
    /// Token id for audit records.
    pub fn token_id(&self) -> Option<&str> {
        self.0.as_ref().map(|p| p.token_id.as_str())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Caller(parts.extensions.get::<ServicePrincipal>().cloned()))
    }
}
