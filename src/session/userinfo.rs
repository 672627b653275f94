// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User-info lookups and their in-process cache.
//!
//! Entries are keyed by the session access token and carry the caller's
//! username and group claims. Expired entries are evicted when read; there
//! is no background sweep. The cache is local to one process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::clock::Clock;

/// Claims the proxy authorizes on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserClaims {
    pub groups: Vec<String>,
}

/// Cached user-info entry. Always replaced as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub access_token: String,
    /// Epoch milliseconds.
    pub expires_at: i64,
    pub claims: UserClaims,
    pub username: String,
}

#[derive(Default)]
struct CacheInner {
    by_token: HashMap<String, UserInfo>,
    by_username: HashMap<String, String>,
}

impl CacheInner {
    fn drop_index(&mut self, username: &str, access_token: &str) {
        if self.by_username.get(username).map(String::as_str) == Some(access_token) {
            self.by_username.remove(username);
        }
    }
}

/// TTL map of user info keyed by access token, with a username index.
pub struct UserInfoCache {
    inner: Mutex<CacheInner>,
    clock: Arc<dyn Clock>,
}

impl UserInfoCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            clock,
        }
    }

    /// Entry for `access_token`, or `None` if absent or expired.
    pub fn get(&self, access_token: &str) -> Option<UserInfo> {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock().ok()?;

        match inner.by_token.get(access_token) {
            Some(entry) if now <= entry.expires_at => return Some(entry.clone()),
            Some(_) => {}
            None => return None,
        }

        // expired
        if let Some(entry) = inner.by_token.remove(access_token) {
            inner.drop_index(&entry.username, access_token);
        }
        None
    }

    pub fn set(&self, info: UserInfo) {
        if let Ok(mut inner) = self.inner.lock() {
            let token = info.access_token.clone();
            if let Some(previous) = inner.by_token.get(&token).map(|e| e.username.clone()) {
                inner.drop_index(&previous, &token);
            }
            inner.by_username.insert(info.username.clone(), token.clone());
            inner.by_token.insert(token, info);
        }
    }

    pub fn remove(&self, access_token: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            if let Some(entry) = inner.by_token.remove(access_token) {
                inner.drop_index(&entry.username, access_token);
            }
        }
    }

    /// Resolve through the username index, then through [`Self::get`].
    pub fn get_by_username(&self, username: &str) -> Option<UserInfo> {
        let token = {
            let inner = self.inner.lock().ok()?;
            inner.by_username.get(username)?.clone()
        };
        self.get(&token)
    }

    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.by_token.clear();
            inner.by_username.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.by_token.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Identity as reported by the user-info endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub username: String,
    pub email: Option<String>,
    pub groups: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum UserInfoError {
    #[error("user-info request failed: {0}")]
    Transport(String),

    #[error("user-info endpoint returned HTTP {0}")]
    Status(u16),

    #[error("invalid user-info response: {0}")]
    InvalidResponse(String),
}

/// External user-info lookup.
#[async_trait]
pub trait UserInfoSource: Send + Sync {
    async fn fetch(&self, access_token: &str) -> Result<UserProfile, UserInfoError>;
}

#[derive(Deserialize)]
struct UserInfoResponse {
    sub: Option<String>,
    preferred_username: Option<String>,
    email: Option<String>,
    #[serde(default)]
    groups: Vec<String>,
}

/// OIDC `userinfo` endpoint client.
pub struct OidcUserInfoClient {
    url: String,
    client: reqwest::Client,
}

impl OidcUserInfoClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, UserInfoError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UserInfoError::Transport(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl UserInfoSource for OidcUserInfoClient {
    async fn fetch(&self, access_token: &str) -> Result<UserProfile, UserInfoError> {
        let response = self
            .client
            .get(&self.url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| UserInfoError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(UserInfoError::Status(response.status().as_u16()));
        }

        let body: UserInfoResponse = response
            .json()
            .await
            .map_err(|e| UserInfoError::InvalidResponse(e.to_string()))?;

        let username = body
            .preferred_username
            .or(body.sub)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| UserInfoError::InvalidResponse("no username claim".to_string()))?;

        Ok(UserProfile {
            username,
            email: body.email,
            groups: body.groups,
        })
    }
}
