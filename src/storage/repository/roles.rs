// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role repository.
//!
//! Roles are stored as `roles/{id}.json` and looked up by name, which is
//! unique across the registry.

use std::sync::Arc;

use async_trait::async_trait;

use super::super::{FileStorage, StorageError, StorageResult};
use crate::auth::roles::{Role, RoleLookupError, RoleRegistry};

pub struct RoleRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> RoleRepository<'a> {
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    pub fn get(&self, role_id: &str) -> StorageResult<Role> {
        let path = self.storage.paths().role(role_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Role {role_id}")));
        }
        self.storage.read_json(path)
    }

    pub fn list_all(&self) -> StorageResult<Vec<Role>> {
        let ids = self
            .storage
            .list_files(self.storage.paths().roles_dir(), "json")?;

        let mut roles = Vec::with_capacity(ids.len());
        for id in ids {
            roles.push(self.get(&id)?);
        }
        roles.sort_by(|a, b| a.role.cmp(&b.role));
        Ok(roles)
    }

    pub fn find_by_name(&self, name: &str) -> StorageResult<Option<Role>> {
        Ok(self.list_all()?.into_iter().find(|role| role.role == name))
    }

    /// Insert or replace the role with `role.role` as name.
    ///
    /// An existing role keeps its id.
    pub fn upsert(&self, mut role: Role) -> StorageResult<Role> {
        match self.find_by_name(&role.role)? {
            Some(existing) => role.id = existing.id,
            None if role.id.is_empty() => role.id = uuid::Uuid::new_v4().to_string(),
            None => {}
        }
        if uuid::Uuid::parse_str(&role.id).is_err() {
            return Err(StorageError::SerializationError(format!(
                "Invalid role id {}",
                role.id
            )));
        }

        self.storage
            .write_json(self.storage.paths().role(&role.id), &role)?;
        Ok(role)
    }

    pub fn delete_by_name(&self, name: &str) -> StorageResult<Role> {
        let role = self
            .find_by_name(name)?
            .ok_or_else(|| StorageError::NotFound(format!("Role {name}")))?;
        self.storage.delete(self.storage.paths().role(&role.id))?;
        Ok(role)
    }
}

/// [`RoleRegistry`] backed by [`FileStorage`].
#[derive(Clone)]
pub struct FileRoleRegistry {
    storage: Arc<FileStorage>,
}

impl FileRoleRegistry {
    pub fn new(storage: Arc<FileStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl RoleRegistry for FileRoleRegistry {
    async fn find_by_name(&self, name: &str) -> Result<Option<Role>, RoleLookupError> {
        RoleRepository::new(&self.storage)
            .find_by_name(name)
            .map_err(|e| RoleLookupError(e.to_string()))
    }
}
