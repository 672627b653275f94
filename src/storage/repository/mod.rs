// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to file storage.
//!
//! Each repository provides CRUD operations for one entity type and a
//! registry adapter implementing the matching trait from `auth`.

pub mod access_tokens;
pub mod roles;

pub use access_tokens::{AccessTokenRepository, FileTokenRegistry};
pub use roles::{FileRoleRegistry, RoleRepository};
