// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Persistent Storage
//!
//! Token registry, role registry and audit log, stored as plain JSON files
//! under the data directory (`DATA_DIR`).
//!
//! ## Storage Layout
//!
//! ```text
//! /data/
//!   tokens/
//!     {token_id}.json      # ServiceAccessToken record (never the signed token)
//!   roles/
//!     {role_id}.json       # Role with actors and permissions
//!   audit/
//!     {date}/events.jsonl  # Daily audit logs
//! ```
//!
//! Record writes are atomic (temp file + rename). Audit lines are appended.

pub mod audit;
pub mod file_store;
pub mod paths;
pub mod repository;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use file_store::{FileStorage, StorageError, StorageResult};
pub use paths::StoragePaths;
pub use repository::{AccessTokenRepository, FileRoleRegistry, FileTokenRegistry, RoleRepository};
