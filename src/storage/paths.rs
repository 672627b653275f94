// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path layout of the data directory.
//!
//! ```text
//! {root}/
//!   tokens/{token_id}.json     # service access token records
//!   roles/{role_id}.json       # role registry
//!   audit/{date}/events.jsonl  # daily audit log
//! ```

use std::path::{Path, PathBuf};

/// Default data directory.
pub const DATA_ROOT: &str = "/data";

#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Service Access Tokens ==========

    pub fn tokens_dir(&self) -> PathBuf {
        self.root.join("tokens")
    }

    pub fn access_token(&self, token_id: &str) -> PathBuf {
        self.tokens_dir().join(format!("{token_id}.json"))
    }

    // ========== Roles ==========

    pub fn roles_dir(&self) -> PathBuf {
        self.root.join("roles")
    }

    pub fn role(&self, role_id: &str) -> PathBuf {
        self.roles_dir().join(format!("{role_id}.json"))
    }

    // ========== Audit Log ==========

    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    /// Directory for a specific date's audit logs.
    pub fn audit_date_dir(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date)
    }

    /// Path to a daily audit events file (JSONL format).
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_date_dir(date).join("events.jsonl")
    }
}
