// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signing scheme for service access tokens.
//!
//! [`TokenCodec`] hides the concrete algorithm so the authority can switch
//! schemes without touching callers. The default [`Hs256Codec`] produces a
//! compact JWT signed with HMAC-SHA256.
//!
//! Expiry is *not* checked here: the codec only proves the payload was
//! signed with the secret. The authority compares `exp` with its own clock.

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

/// Signed payload of a service access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTokenClaims {
    /// Registry identifier of the token.
    #[serde(rename = "tokenId")]
    pub token_id: String,
    /// Expiration (Unix timestamp, seconds).
    pub exp: i64,
    /// Permission patterns granted to the bearer.
    pub permissions: Vec<String>,
}

/// Codec failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Sign and verify token payloads with a shared secret.
pub trait TokenCodec: Send + Sync {
    fn sign(&self, claims: &ServiceTokenClaims, secret: &[u8]) -> Result<String, CodecError>;

    fn verify(&self, token: &str, secret: &[u8]) -> Result<ServiceTokenClaims, CodecError>;
}

/// HMAC-SHA256 JWT codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hs256Codec;

impl TokenCodec for Hs256Codec {
    fn sign(&self, claims: &ServiceTokenClaims, secret: &[u8]) -> Result<String, CodecError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret),
        )
        .map_err(|e| CodecError::Signing(e.to_string()))
    }

    fn verify(&self, token: &str, secret: &[u8]) -> Result<ServiceTokenClaims, CodecError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        decode::<ServiceTokenClaims>(token, &DecodingKey::from_secret(secret), &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => CodecError::InvalidSignature,
                _ => CodecError::Malformed,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn claims() -> ServiceTokenClaims {
        ServiceTokenClaims {
            token_id: "tok_abc".to_string(),
            exp: 4_102_444_800,
            permissions: vec!["GET:*".to_string()],
        }
    }

    #[test]
    fn verify_returns_signed_payload() {
        let token = Hs256Codec.sign(&claims(), SECRET).unwrap();
        assert_eq!(Hs256Codec.verify(&token, SECRET).unwrap(), claims());
    }

    #[test]
    fn payload_uses_token_id_key() {
        let json = serde_json::to_value(claims()).unwrap();
        assert_eq!(json["tokenId"], "tok_abc");
    }

    #[test]
    fn wrong_secret_is_invalid_signature() {
        let token = Hs256Codec.sign(&claims(), SECRET).unwrap();
        let err = Hs256Codec
            .verify(&token, b"another-secret-another-secret-xx")
            .unwrap_err();
        assert_eq!(err, CodecError::InvalidSignature);
    }

    #[test]
    fn garbage_is_malformed() {
        assert_eq!(
            Hs256Codec.verify("not-a-token", SECRET).unwrap_err(),
            CodecError::Malformed
        );
    }

    #[test]
    fn expired_payload_still_decodes() {
        let mut expired = claims();
        expired.exp = 1;
        let token = Hs256Codec.sign(&expired, SECRET).unwrap();
        assert_eq!(Hs256Codec.verify(&token, SECRET).unwrap().exp, 1);
    }
}
