// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Roles granting administrative capabilities to people and groups.
//!
//! A role is resolved by name when the proxy authorizes a request. Its actor
//! list names the users and IdP groups that hold it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Kind of actor a role is granted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ActorType {
    /// IdP group claim
    Group,
    /// Username
    User,
}

/// One holder of a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Actor {
    pub name: String,
    #[serde(rename = "type")]
    pub actor_type: ActorType,
}

impl Actor {
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actor_type: ActorType::Group,
        }
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actor_type: ActorType::User,
        }
    }
}

/// Permission reference attached to a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RolePermission {
    pub id: String,
    #[serde(rename = "type")]
    pub permission_type: String,
}

/// A named role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Role {
    pub id: String,
    /// Role name, unique within the registry.
    pub role: String,
    #[serde(default)]
    pub actors: Vec<Actor>,
    #[serde(default)]
    pub permissions: Vec<RolePermission>,
}

impl Role {
    /// True when `username` is a `User` actor or any of `groups` is a
    /// `Group` actor. An empty actor list admits nobody; callers decide how
    /// to treat that case.
    pub fn admits(&self, username: &str, groups: &[String]) -> bool {
        self.actors.iter().any(|actor| match actor.actor_type {
            ActorType::User => actor.name == username,
            ActorType::Group => groups.iter().any(|group| *group == actor.name),
        })
    }
}

/// Role lookup failed for a reason other than "not found".
#[derive(Debug, thiserror::Error)]
#[error("role lookup failed: {0}")]
pub struct RoleLookupError(pub String);

/// Read access to the role registry.
#[async_trait]
pub trait RoleRegistry: Send + Sync {
    /// `Ok(None)` when no role has this name.
    async fn find_by_name(&self, name: &str) -> Result<Option<Role>, RoleLookupError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(actors: Vec<Actor>) -> Role {
        Role {
            id: "r1".to_string(),
            role: "admin".to_string(),
            actors,
            permissions: vec![],
        }
    }

    #[test]
    fn admits_matching_group() {
        let r = role(vec![Actor::group("Admins")]);
        assert!(r.admits("alice", &["Viewers".to_string(), "Admins".to_string()]));
        assert!(!r.admits("alice", &["Viewers".to_string()]));
    }

    #[test]
    fn admits_matching_user_only_by_username() {
        let r = role(vec![Actor::user("alice")]);
        assert!(r.admits("alice", &[]));
        assert!(!r.admits("bob", &["alice".to_string()]));
    }

    #[test]
    fn group_actor_does_not_match_username() {
        let r = role(vec![Actor::group("alice")]);
        assert!(!r.admits("alice", &[]));
    }

    #[test]
    fn empty_actor_list_admits_nobody() {
        assert!(!role(vec![]).admits("alice", &["Admins".to_string()]));
    }

    #[test]
    fn actor_type_serializes_as_type_field() {
        let json = serde_json::to_value(Actor::group("Admins")).unwrap();
        assert_eq!(json, serde_json::json!({"name": "Admins", "type": "Group"}));
    }
}
