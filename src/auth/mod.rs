// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authorization Module
//!
//! Service access tokens and the route guard protecting the backend API.
//!
//! ## Flow
//!
//! 1. An operator issues a token through `POST /v1/tokens` with a list of
//!    permission patterns (`*`, `GET:*`, `*:/v1/*`, `DELETE:/v1/tokens/{token_id}`).
//! 2. The console's backend-facing requests send `Authorization: Bearer <token>`.
//! 3. Each guarded route:
//!    - verifies signature and expiry with the configured secret
//!    - checks the token's patterns against `METHOD:/route/template`
//!    - exposes the [`ServicePrincipal`] to handlers via [`Caller`]
//!
//! Roles (`roles`) gate human users on the console proxy, not service tokens.

pub mod claims;
pub mod codec;
pub mod error;
pub mod extractor;
pub mod middleware;
pub mod permissions;
pub mod roles;
pub mod routes;
pub mod tokens;

pub use claims::ServicePrincipal;
pub use codec::{Hs256Codec, ServiceTokenClaims, TokenCodec};
pub use error::AuthError;
pub use extractor::Caller;
pub use middleware::RouteGuard;
pub use roles::{Actor, ActorType, Role, RoleLookupError, RolePermission, RoleRegistry};
pub use routes::{GuardedRouter, RouteEntry, RouteRegistry};
pub use tokens::{AccessTokenAuthority, IssuedToken, ServiceAccessToken, TokenError, TokenRegistry};
