// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Service access token authority.
//!
//! Issues, verifies and revokes the signed credentials that represent the
//! console (not a human) to the backend API.
//!
//! ## Lifecycle
//!
//! 1. `issue` generates a random token id, signs `{tokenId, exp, permissions}`
//!    and persists the record. The signed artifact is returned once and is not
//!    stored anywhere.
//! 2. `verify` checks structure, signature and expiry only. It does not read
//!    the registry, so a revoked token keeps verifying until `exp`.
//! 3. `revoke` flips `isValid` to false in the registry. Idempotent.

use std::sync::Arc;

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use super::codec::{CodecError, ServiceTokenClaims, TokenCodec};
use super::permissions::{validate_pattern, InvalidPattern};
use crate::clock::Clock;

/// Random bytes in a token id (256 bits).
const TOKEN_ID_BYTES: usize = 32;

/// Minimum accepted signing secret length.
pub const MIN_SECRET_LEN: usize = 32;

/// Persisted record of an issued service access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccessToken {
    /// Record identifier (UUID).
    pub id: String,
    /// Identifier embedded in the signed token.
    pub token_id: String,
    /// Human-readable label.
    pub name: String,
    pub created_date: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// False once revoked.
    pub is_valid: bool,
    pub permissions: Vec<String>,
}

/// Result of [`AccessTokenAuthority::issue`].
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The signed artifact. Only available here.
    pub token: String,
    pub record: ServiceAccessToken,
}

/// Errors from the token authority.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token {0} not found")]
    NotFound(String),

    #[error("token name must not be empty")]
    EmptyName,

    #[error("expiry must be in the future")]
    ExpiryInPast,

    #[error(transparent)]
    InvalidPermission(#[from] InvalidPattern),

    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("token registry error: {0}")]
    Registry(String),
}

impl From<CodecError> for TokenError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Malformed => TokenError::Malformed,
            CodecError::InvalidSignature => TokenError::InvalidSignature,
            CodecError::Signing(msg) => TokenError::Signing(msg),
        }
    }
}

/// Persistent store of token records.
///
/// Each mutating call must be a single atomic write.
pub trait TokenRegistry: Send + Sync {
    fn insert(&self, token: &ServiceAccessToken) -> Result<(), TokenError>;

    fn get(&self, token_id: &str) -> Result<Option<ServiceAccessToken>, TokenError>;

    fn list(&self) -> Result<Vec<ServiceAccessToken>, TokenError>;

    fn update(&self, token: &ServiceAccessToken) -> Result<(), TokenError>;
}

/// Issues and verifies service access tokens.
pub struct AccessTokenAuthority {
    secret: Vec<u8>,
    codec: Arc<dyn TokenCodec>,
    registry: Arc<dyn TokenRegistry>,
    clock: Arc<dyn Clock>,
    rng: SystemRandom,
}

impl AccessTokenAuthority {
    pub fn new(
        secret: impl Into<Vec<u8>>,
        codec: Arc<dyn TokenCodec>,
        registry: Arc<dyn TokenRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            secret: secret.into(),
            codec,
            registry,
            clock,
            rng: SystemRandom::new(),
        }
    }

    /// Issue a new token and persist its record.
    pub fn issue(
        &self,
        name: &str,
        expires_at: DateTime<Utc>,
        permissions: Vec<String>,
    ) -> Result<IssuedToken, TokenError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TokenError::EmptyName);
        }

        let now = self.clock.now();
        if expires_at <= now {
            return Err(TokenError::ExpiryInPast);
        }

        for pattern in &permissions {
            validate_pattern(pattern)?;
        }

        let token_id = self.generate_token_id()?;
        let claims = ServiceTokenClaims {
            token_id: token_id.clone(),
            exp: expires_at.timestamp(),
            permissions: permissions.clone(),
        };
        let token = self.codec.sign(&claims, &self.secret)?;

        let record = ServiceAccessToken {
            id: uuid::Uuid::new_v4().to_string(),
            token_id,
            name: name.to_string(),
            created_date: now,
            expires_at,
            is_valid: true,
            permissions,
        };
        self.registry.insert(&record)?;

        info!(
            token_id = %record.token_id,
            name = %record.name,
            expires_at = %record.expires_at,
            "Issued service access token"
        );

        Ok(IssuedToken { token, record })
    }

    /// Verify a signed token and return its payload.
    ///
    /// Pure function of the secret and the clock; the registry's `isValid`
    /// flag is not consulted.
    pub fn verify(&self, token: &str) -> Result<ServiceTokenClaims, TokenError> {
        let claims = self.codec.verify(token, &self.secret)?;
        if self.clock.now().timestamp() > claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    /// Mark a token as revoked. Revoking twice is not an error.
    pub fn revoke(&self, token_id: &str) -> Result<ServiceAccessToken, TokenError> {
        let mut record = self
            .registry
            .get(token_id)?
            .ok_or_else(|| TokenError::NotFound(token_id.to_string()))?;

        if record.is_valid {
            record.is_valid = false;
            self.registry.update(&record)?;
            info!(token_id = %token_id, "Revoked service access token");
        }

        Ok(record)
    }

    /// All token records, newest first. Never includes signed artifacts.
    pub fn list(&self) -> Result<Vec<ServiceAccessToken>, TokenError> {
        let mut tokens = self.registry.list()?;
        tokens.sort_by(|a, b| b.created_date.cmp(&a.created_date));
        Ok(tokens)
    }

    fn generate_token_id(&self) -> Result<String, TokenError> {
        let mut bytes = [0u8; TOKEN_ID_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| TokenError::Signing("random generator failure".to_string()))?;
        Ok(Base64UrlUnpadded::encode_string(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::codec::Hs256Codec;
    use crate::clock::ManualClock;
    use crate::storage::{FileStorage, FileTokenRegistry, StoragePaths};
    use chrono::Duration;
    use tempfile::TempDir;

    const SECRET: &[u8] = b"test-secret-test-secret-test-secret";

    struct Fixture {
        _temp: TempDir,
        clock: Arc<ManualClock>,
        authority: AccessTokenAuthority,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStorage::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        let clock = Arc::new(ManualClock::starting_now());
        let authority = AccessTokenAuthority::new(
            SECRET,
            Arc::new(Hs256Codec),
            Arc::new(FileTokenRegistry::new(Arc::new(storage))),
            clock.clone(),
        );
        Fixture {
            _temp: temp,
            clock,
            authority,
        }
    }

    fn perms() -> Vec<String> {
        vec!["GET:*".to_string(), "*:/v1/roles".to_string()]
    }

    #[test]
    fn issue_then_verify_round_trips_permissions() {
        let f = fixture();
        let expires_at = f.clock.now() + Duration::hours(1);
        let issued = f.authority.issue("ci", expires_at, perms()).unwrap();

        let claims = f.authority.verify(&issued.token).unwrap();
        assert_eq!(claims.permissions, perms());
        assert_eq!(claims.token_id, issued.record.token_id);
        assert_eq!(claims.exp, expires_at.timestamp());
    }

    #[test]
    fn verify_fails_once_clock_passes_expiry() {
        let f = fixture();
        let expires_at = f.clock.now() + Duration::hours(1);
        let issued = f.authority.issue("ci", expires_at, perms()).unwrap();

        f.clock.advance(Duration::hours(1) + Duration::seconds(1));
        assert!(matches!(
            f.authority.verify(&issued.token),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn issued_record_is_persisted_without_the_token() {
        let f = fixture();
        let issued = f
            .authority
            .issue("ci", f.clock.now() + Duration::days(1), perms())
            .unwrap();

        let listed = f.authority.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].is_valid);
        assert_eq!(listed[0].name, "ci");
        let json = serde_json::to_string(&listed[0]).unwrap();
        assert!(!json.contains(&issued.token));
    }

    #[test]
    fn token_ids_are_unique_and_long() {
        let f = fixture();
        let exp = f.clock.now() + Duration::days(1);
        let a = f.authority.issue("a", exp, vec![]).unwrap();
        let b = f.authority.issue("b", exp, vec![]).unwrap();
        assert_ne!(a.record.token_id, b.record.token_id);
        // 32 bytes base64url without padding.
        assert_eq!(a.record.token_id.len(), 43);
    }

    #[test]
    fn revoke_is_idempotent() {
        let f = fixture();
        let issued = f
            .authority
            .issue("ci", f.clock.now() + Duration::days(1), perms())
            .unwrap();

        let first = f.authority.revoke(&issued.record.token_id).unwrap();
        let second = f.authority.revoke(&issued.record.token_id).unwrap();
        assert!(!first.is_valid);
        assert!(!second.is_valid);
    }

    #[test]
    fn revoked_token_still_verifies_until_expiry() {
        let f = fixture();
        let issued = f
            .authority
            .issue("ci", f.clock.now() + Duration::days(1), perms())
            .unwrap();
        f.authority.revoke(&issued.record.token_id).unwrap();
        assert!(f.authority.verify(&issued.token).is_ok());
    }

    #[test]
    fn revoke_unknown_token_is_not_found() {
        let f = fixture();
        assert!(matches!(
            f.authority.revoke("missing"),
            Err(TokenError::NotFound(_))
        ));
    }

    #[test]
    fn issue_rejects_bad_input() {
        let f = fixture();
        let future = f.clock.now() + Duration::days(1);
        assert!(matches!(
            f.authority.issue("  ", future, perms()),
            Err(TokenError::EmptyName)
        ));
        assert!(matches!(
            f.authority.issue("ci", f.clock.now(), perms()),
            Err(TokenError::ExpiryInPast)
        ));
        assert!(matches!(
            f.authority.issue("ci", future, vec!["nope".to_string()]),
            Err(TokenError::InvalidPermission(_))
        ));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let f = fixture();
        let claims = ServiceTokenClaims {
            token_id: "forged".to_string(),
            exp: (f.clock.now() + Duration::days(1)).timestamp(),
            permissions: vec!["*".to_string()],
        };
        let forged = Hs256Codec
            .sign(&claims, b"attacker-secret-attacker-secret-xx")
            .unwrap();
        assert!(matches!(
            f.authority.verify(&forged),
            Err(TokenError::InvalidSignature)
        ));
        assert!(matches!(
            f.authority.verify("a.b"),
            Err(TokenError::Malformed)
        ));
    }
}
