// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 HealthHub

//! Credential hashing and verification (Argon2id, PHC string format).
//!
//! Cost parameters are fixed when the verifier is constructed and apply to
//! every hash it produces. Existing hashes carry their own parameters in
//! the PHC string, so raising the cost never invalidates stored secrets.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand_core::OsRng;

/// Secret used to build the timing-equalisation hash.
const DUMMY_SECRET: &str = "healthhub-dummy-secret";

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// The hashing primitive itself failed (bad parameters, RNG failure).
    #[error("credential hashing failed: {0}")]
    Hashing(String),

    /// Unknown identity, inactive identity or wrong secret.
    #[error("Invalid email or password")]
    InvalidCredentials,
}

/// Hashes and verifies user secrets.
pub struct CredentialVerifier {
    argon2: Argon2<'static>,
    dummy_hash: String,
}

impl CredentialVerifier {
    /// Build a verifier with explicit Argon2id cost parameters.
    pub fn new(params: Params) -> Result<Self, CredentialError> {
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let dummy_hash = hash_with(&argon2, DUMMY_SECRET)?;
        Ok(Self { argon2, dummy_hash })
    }

    /// Build a verifier from raw cost values (memory in KiB).
    pub fn with_cost(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Self, CredentialError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| CredentialError::Hashing(e.to_string()))?;
        Self::new(params)
    }

    /// Hash a secret with a fresh random salt.
    ///
    /// Weak or empty input is hashed like any other; strength policy is
    /// the caller's concern.
    pub fn hash(&self, secret: &str) -> Result<String, CredentialError> {
        hash_with(&self.argon2, secret)
    }

    /// Check a secret against a stored PHC hash.
    ///
    /// Returns `false` for a mismatch and for a hash that cannot be parsed.
    pub fn verify(&self, secret: &str, hashed: &str) -> bool {
        let parsed = match PasswordHash::new(hashed) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "Stored credential hash is unparsable");
                return false;
            }
        };
        self.argon2
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok()
    }

    /// Spend one verification on a fixed hash.
    ///
    /// Called when the identity is unknown so the response time matches a
    /// wrong-secret attempt.
    pub fn verify_dummy(&self, secret: &str) {
        let _ = self.verify(secret, &self.dummy_hash);
    }
}

impl std::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVerifier").finish_non_exhaustive()
    }
}

fn hash_with(argon2: &Argon2<'_>, secret: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    argon2
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CredentialError::Hashing(e.to_string()))
}

/// Cheapest valid parameters, for tests only.
#[cfg(test)]
pub(crate) fn test_verifier() -> CredentialVerifier {
    CredentialVerifier::with_cost(8, 1, 1).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let verifier = test_verifier();
        let hash = verifier.hash("correct horse battery staple").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(verifier.verify("correct horse battery staple", &hash));
        assert!(!verifier.verify("Correct horse battery staple", &hash));
    }

    #[test]
    fn same_secret_hashes_differently() {
        let verifier = test_verifier();
        let first = verifier.hash("secret").unwrap();
        let second = verifier.hash("secret").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn empty_secret_is_hashed() {
        let verifier = test_verifier();
        let hash = verifier.hash("").unwrap();
        assert!(verifier.verify("", &hash));
        assert!(!verifier.verify("x", &hash));
    }

    #[test]
    fn unparsable_hash_is_false_not_error() {
        let verifier = test_verifier();
        assert!(!verifier.verify("secret", "not-a-phc-string"));
        assert!(!verifier.verify("secret", ""));
    }

    #[test]
    fn hash_from_other_cost_still_verifies() {
        let cheap = test_verifier();
        let other = CredentialVerifier::with_cost(16, 2, 1).unwrap();
        let hash = other.hash("secret").unwrap();
        assert!(cheap.verify("secret", &hash));
    }

    #[test]
    fn invalid_cost_is_hashing_error() {
        let result = CredentialVerifier::with_cost(0, 0, 0);
        assert!(matches!(result, Err(CredentialError::Hashing(_))));
    }
}
