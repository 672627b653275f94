// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Process-local session records keyed by the opaque session cookie value.
//!
//! The session cookie carries no `Max-Age`, so the store decides how long a
//! session lives: a record is dropped once it has been unused for the idle
//! timeout or its token could not be refreshed.

use std::collections::HashMap;
use std::sync::Arc;

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Duration;
use ring::rand::{SecureRandom, SystemRandom};
use tokio::sync::RwLock;
use tracing::debug;

use super::token::SessionToken;
use crate::clock::Clock;

const SESSION_ID_BYTES: usize = 32;

#[derive(Debug, thiserror::Error)]
#[error("failed to generate session id")]
pub struct SessionIdError;

struct Entry {
    session: SessionToken,
    last_seen: i64,
}

/// Server-side session records. The browser only ever holds the id.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Entry>>,
    rng: SystemRandom,
    clock: Arc<dyn Clock>,
    idle_timeout_ms: i64,
}

impl SessionStore {
    pub fn new(clock: Arc<dyn Clock>, idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            rng: SystemRandom::new(),
            clock,
            idle_timeout_ms: idle_timeout.num_milliseconds(),
        }
    }

    /// Store a new session and return its id. Stale records are purged first.
    pub async fn create(&self, session: SessionToken) -> Result<String, SessionIdError> {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        self.rng.fill(&mut bytes).map_err(|_| SessionIdError)?;
        let id = Base64UrlUnpadded::encode_string(&bytes);

        let now = self.clock.now_ms();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| !self.is_stale(entry, now));
        if sessions.len() < before {
            debug!(evicted = before - sessions.len(), "Purged stale sessions");
        }

        sessions.insert(
            id.clone(),
            Entry {
                session,
                last_seen: now,
            },
        );
        Ok(id)
    }

    /// Live session for `id`. Marks it as used; stale records are evicted.
    pub async fn get(&self, id: &str) -> Option<SessionToken> {
        let now = self.clock.now_ms();
        let mut sessions = self.sessions.write().await;

        let entry = sessions.get_mut(id)?;
        if self.is_stale(entry, now) {
            sessions.remove(id);
            debug!("Evicted stale session");
            return None;
        }
        entry.last_seen = now;
        Some(entry.session.clone())
    }

    /// Replace a session after refresh. No-op if it was signed out meanwhile.
    pub async fn replace(&self, id: &str, session: SessionToken) {
        if let Some(entry) = self.sessions.write().await.get_mut(id) {
            entry.session = session;
        }
    }

    pub async fn remove(&self, id: &str) -> Option<SessionToken> {
        self.sessions
            .write()
            .await
            .remove(id)
            .map(|entry| entry.session)
    }

    /// Number of stored records, stale ones included.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn is_stale(&self, entry: &Entry, now: i64) -> bool {
        entry.session.is_errored()
            || now.saturating_sub(entry.last_seen) > self.idle_timeout_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::session::token::{SessionError, SessionUser};

    const IDLE: i64 = 600;

    fn session(access: &str) -> SessionToken {
        SessionToken {
            access_token: access.to_string(),
            access_token_expires: 0,
            refresh_token: None,
            token_endpoint_url: "https://idp/token".to_string(),
            user: SessionUser {
                username: "alice".to_string(),
                email: None,
            },
            error: None,
        }
    }

    fn store() -> (SessionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        (SessionStore::new(clock.clone(), Duration::seconds(IDLE)), clock)
    }

    #[tokio::test]
    async fn create_get_replace_remove() {
        let (store, _clock) = store();
        let id = store.create(session("a1")).await.unwrap();
        assert_eq!(id.len(), 43);
        assert_eq!(store.get(&id).await.unwrap().access_token, "a1");

        store.replace(&id, session("a2")).await;
        assert_eq!(store.get(&id).await.unwrap().access_token, "a2");

        assert!(store.remove(&id).await.is_some());
        assert!(store.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn replace_after_remove_does_not_resurrect() {
        let (store, _clock) = store();
        let id = store.create(session("a1")).await.unwrap();
        store.remove(&id).await;
        store.replace(&id, session("a2")).await;
        assert!(store.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn ids_are_unique() {
        let (store, _clock) = store();
        let a = store.create(session("a")).await.unwrap();
        let b = store.create(session("b")).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn idle_session_is_evicted_on_read() {
        let (store, clock) = store();
        let id = store.create(session("a1")).await.unwrap();

        clock.advance(Duration::seconds(IDLE));
        assert!(store.get(&id).await.is_some());

        clock.advance(Duration::seconds(IDLE) + Duration::milliseconds(1));
        assert!(store.get(&id).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn reads_keep_a_session_alive() {
        let (store, clock) = store();
        let id = store.create(session("a1")).await.unwrap();

        for _ in 0..5 {
            clock.advance(Duration::seconds(IDLE - 1));
            assert!(store.get(&id).await.is_some());
        }
    }

    #[tokio::test]
    async fn errored_session_is_evicted_on_read() {
        let (store, _clock) = store();
        let id = store.create(session("a1")).await.unwrap();

        let mut failed = session("a1");
        failed.error = Some(SessionError::RefreshAccessTokenError);
        store.replace(&id, failed).await;

        assert!(store.get(&id).await.is_none());
        assert!(store.remove(&id).await.is_none());
    }

    #[tokio::test]
    async fn create_purges_abandoned_sessions() {
        let (store, clock) = store();
        for n in 0..3 {
            store.create(session(&format!("old{n}"))).await.unwrap();
        }
        assert_eq!(store.len().await, 3);

        clock.advance(Duration::seconds(IDLE + 1));
        let id = store.create(session("new")).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get(&id).await.unwrap().access_token, "new");
    }
}
