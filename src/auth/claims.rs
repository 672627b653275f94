// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verified caller identity on guarded routes.

use serde::Serialize;
use utoipa::ToSchema;

use super::codec::ServiceTokenClaims;

/// Service principal established by the route guard.
///
/// Inserted into request extensions after a token has been verified and
/// granted the route's permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ServicePrincipal {
    /// Registry id of the presenting token.
    pub token_id: String,
    /// Patterns carried by the token.
    pub permissions: Vec<String>,
    /// Token expiration (Unix timestamp).
    pub expires_at: i64,
}

impl ServicePrincipal {
    pub fn from_claims(claims: ServiceTokenClaims) -> Self {
        Self {
            token_id: claims.token_id,
            permissions: claims.permissions,
            expires_at: claims.exp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_claims_copies_fields() {
        let principal = ServicePrincipal::from_claims(ServiceTokenClaims {
            token_id: "tok".to_string(),
            exp: 42,
            permissions: vec!["*:/v1/*".to_string()],
        });
        assert_eq!(principal.token_id, "tok");
        assert_eq!(principal.expires_at, 42);
        assert_eq!(principal.permissions, vec!["*:/v1/*"]);
    }
}
