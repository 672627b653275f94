// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Service access token repository.
//!
//! Each record is stored as `tokens/{token_id}.json`. Token ids are
//! base64url, so they are safe file names.

use std::sync::Arc;

use super::super::{FileStorage, StorageError, StorageResult};
use crate::auth::tokens::{ServiceAccessToken, TokenError, TokenRegistry};

/// Repository for token records.
pub struct AccessTokenRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> AccessTokenRepository<'a> {
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    pub fn exists(&self, token_id: &str) -> bool {
        is_safe_id(token_id) && self.storage.exists(self.storage.paths().access_token(token_id))
    }

    pub fn get(&self, token_id: &str) -> StorageResult<ServiceAccessToken> {
        if !self.exists(token_id) {
            return Err(StorageError::NotFound(format!("Token {token_id}")));
        }
        self.storage.read_json(self.storage.paths().access_token(token_id))
    }

    pub fn create(&self, token: &ServiceAccessToken) -> StorageResult<()> {
        if !is_safe_id(&token.token_id) {
            return Err(StorageError::SerializationError(format!(
                "Invalid token id {}",
                token.token_id
            )));
        }
        if self.exists(&token.token_id) {
            return Err(StorageError::AlreadyExists(format!(
                "Token {}",
                token.token_id
            )));
        }
        self.storage
            .write_json(self.storage.paths().access_token(&token.token_id), token)
    }

    pub fn update(&self, token: &ServiceAccessToken) -> StorageResult<()> {
        if !self.exists(&token.token_id) {
            return Err(StorageError::NotFound(format!("Token {}", token.token_id)));
        }
        self.storage
            .write_json(self.storage.paths().access_token(&token.token_id), token)
    }

    pub fn list_all(&self) -> StorageResult<Vec<ServiceAccessToken>> {
        let ids = self
            .storage
            .list_files(self.storage.paths().tokens_dir(), "json")?;

        let mut tokens = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get(&id) {
                Ok(token) => tokens.push(token),
                Err(e) => {
                    tracing::warn!(token_id = %id, error = %e, "Skipping unreadable token record")
                }
            }
        }
        Ok(tokens)
    }
}

/// Ids become file names; refuse anything that could escape the directory.
fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// [`TokenRegistry`] backed by [`FileStorage`].
#[derive(Clone)]
pub struct FileTokenRegistry {
    storage: Arc<FileStorage>,
}

impl FileTokenRegistry {
    pub fn new(storage: Arc<FileStorage>) -> Self {
        Self { storage }
    }
}

fn registry_error(e: StorageError) -> TokenError {
    TokenError::Registry(e.to_string())
}

impl TokenRegistry for FileTokenRegistry {
    fn insert(&self, token: &ServiceAccessToken) -> Result<(), TokenError> {
        AccessTokenRepository::new(&self.storage)
            .create(token)
            .map_err(registry_error)
    }

    fn get(&self, token_id: &str) -> Result<Option<ServiceAccessToken>, TokenError> {
        match AccessTokenRepository::new(&self.storage).get(token_id) {
            Ok(token) => Ok(Some(token)),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(registry_error(e)),
        }
    }

    fn list(&self) -> Result<Vec<ServiceAccessToken>, TokenError> {
        AccessTokenRepository::new(&self.storage)
            .list_all()
            .map_err(registry_error)
    }

    fn update(&self, token: &ServiceAccessToken) -> Result<(), TokenError> {
        AccessTokenRepository::new(&self.storage)
            .update(token)
            .map_err(registry_error)
    }
}
