// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 HealthHub

//! Session token issuance and validation (HS256 compact JWS).
//!
//! ## Validation order
//!
//! 1. Structure: exactly three base64url segments with a JSON header.
//! 2. Algorithm: the header `alg` must be `HS256`. Anything else,
//!    including `none`, is reported as a bad signature.
//! 3. Signature encoding: once the header is accepted, a signature
//!    segment that is not canonical base64url is a bad signature.
//! 4. Signature and required claims (`jsonwebtoken`).
//! 5. Time window against the caller's clock, zero leeway:
//!    `nbf <= now < exp`.

use std::collections::BTreeSet;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::Deserialize;
use uuid::Uuid;

use super::claims::TokenClaims;

/// Minimum signing key length in bytes.
pub const MIN_KEY_LEN: usize = 32;

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Why a token was rejected (or could not be issued).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("token is not yet valid")]
    NotYetValid,

    #[error("signing key must be at least {MIN_KEY_LEN} bytes, got {0}")]
    KeyTooShort(usize),

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

impl TokenError {
    /// Short tag used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::Malformed => "malformed",
            TokenError::BadSignature => "bad_signature",
            TokenError::Expired => "expired",
            TokenError::NotYetValid => "not_yet_valid",
            TokenError::KeyTooShort(_) => "key_too_short",
            TokenError::Encoding(_) => "encoding",
        }
    }
}

/// A freshly signed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

/// Signs and verifies session tokens with one symmetric key.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    validity: Duration,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(
        secret: &[u8],
        issuer: impl Into<String>,
        validity: Duration,
    ) -> Result<Self, TokenError> {
        if secret.len() < MIN_KEY_LEN {
            return Err(TokenError::KeyTooShort(secret.len()));
        }
        let issuer = issuer.into();

        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "nbf", "iat", "iss", "sub"]);
        validation.set_issuer(&[issuer.as_str()]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer,
            validity,
            validation,
        })
    }

    /// Sign a token for an identity, valid from `now` for the configured window.
    pub fn issue(
        &self,
        identity_id: Uuid,
        email: &str,
        roles: impl IntoIterator<Item = String>,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let iat = now.timestamp();
        let exp = iat + self.validity.num_seconds();
        let claims = TokenClaims {
            user_id: identity_id,
            email: email.to_string(),
            roles: roles.into_iter().collect::<BTreeSet<_>>(),
            iss: self.issuer.clone(),
            sub: identity_id.to_string(),
            iat,
            nbf: iat,
            exp,
        };
        let expires_at = claims.expires_at();

        let token = encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;

        tracing::debug!(user_id = %identity_id, exp, "Token issued");
        Ok(IssuedToken { token, expires_at })
    }

    /// Verify a token and return its claims.
    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
        check_header(token)?;

        let claims = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenError::BadSignature
                }
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::ImmatureSignature => TokenError::NotYetValid,
                _ => TokenError::Malformed,
            })?
            .claims;

        if claims.sub != claims.user_id.to_string() {
            return Err(TokenError::Malformed);
        }

        let now = now.timestamp();
        if now >= claims.exp {
            return Err(TokenError::Expired);
        }
        if now < claims.nbf {
            return Err(TokenError::NotYetValid);
        }
        Ok(claims)
    }

    /// Re-issue a valid token with the same identity, email and roles.
    ///
    /// The role set is copied from the presented token; the registry is
    /// not consulted.
    pub fn refresh(&self, token: &str, now: DateTime<Utc>) -> Result<IssuedToken, TokenError> {
        let claims = self.validate(token, now)?;
        self.issue(claims.user_id, &claims.email, claims.roles, now)
    }
}

/// Reject anything that is not a three-segment HS256 token before the
/// signature check runs.
fn check_header(token: &str) -> Result<(), TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return Err(TokenError::Malformed);
    }

    let header_bytes = URL_SAFE_NO_PAD
        .decode(segments[0])
        .map_err(|_| TokenError::Malformed)?;
    let header: RawHeader =
        serde_json::from_slice(&header_bytes).map_err(|_| TokenError::Malformed)?;

    if header.alg != "HS256" {
        return Err(TokenError::BadSignature);
    }

    URL_SAFE_NO_PAD
        .decode(segments[2])
        .map_err(|_| TokenError::BadSignature)?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_codec() -> TokenCodec {
    TokenCodec::new(
        b"0123456789abcdef0123456789abcdef",
        "HealthHub API",
        Duration::hours(24),
    )
    .unwrap()
}
