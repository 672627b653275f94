// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Browser sessions against the OIDC identity provider.
//!
//! - `token` - the per-browser session record
//! - `cookies` - session id and sign-in state cookies
//! - `manager` - refresh state machine and the IdP token endpoint client
//! - `store` - server-side session records behind an opaque cookie id
//! - `userinfo` - user-info endpoint client and its TTL cache

pub mod cookies;
pub mod manager;
pub mod store;
pub mod token;
pub mod userinfo;

pub use cookies::CookieSettings;
pub use manager::{
    IdentityProvider, IdpError, OidcTokenClient, RefreshCredentials, SessionTokenManager,
    TokenGrant,
};
pub use store::SessionStore;
pub use token::{SessionError, SessionToken, SessionUser};
pub use userinfo::{
    OidcUserInfoClient, UserClaims, UserInfo, UserInfoCache, UserInfoError, UserInfoSource,
    UserProfile,
};
