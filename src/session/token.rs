// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use serde::{Deserialize, Serialize};

/// Identity of the signed-in user, as reported by the user-info endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Terminal session marker. Sticky until the next sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionError {
    RefreshAccessTokenError,
}

/// Per-browser OIDC session.
///
/// Replaced wholesale on every refresh; never partially updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    pub access_token: String,
    /// Epoch milliseconds, always taken from the server clock.
    pub access_token_expires: i64,
    pub refresh_token: Option<String>,
    pub token_endpoint_url: String,
    pub user: SessionUser,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SessionError>,
}

impl SessionToken {
    pub fn is_errored(&self) -> bool {
        self.error.is_some()
    }
}
