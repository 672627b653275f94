// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Console Gateway - admin backend API and authorizing proxy
//!
//! The gateway issues signed service access tokens, guards every admin route
//! with a permission derived from its method and path, and forwards browser
//! requests from the admin console to the backend once the signed-in
//! operator is admitted by the admin role.
//!
//! ## Modules
//!
//! - `api` - HTTP handlers and the router (Axum)
//! - `auth` - service access tokens, permissions, route guard and roles
//! - `session` - OIDC sessions, refresh and the user-info cache
//! - `proxy` - authorizing reverse proxy
//! - `storage` - file-backed token, role and audit records

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod proxy;
pub mod session;
pub mod state;
pub mod storage;
