//! One-way password hashing (Argon2id, PHC string format).

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, Version};
use argon2::{PasswordHasher as _, PasswordVerifier as _};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordHashError {
    #[error("invalid hashing parameters: {0}")]
    InvalidParams(String),

    #[error("hashing failed: {0}")]
    Hashing(String),
}

/// Salted, slow, one-way password digests.
///
/// Implementations must never log or return the plaintext.
pub trait PasswordHasher: Send + Sync {
    /// Produce a salted digest for storage.
    fn hash(&self, plaintext: &str) -> Result<String, PasswordHashError>;

    /// Recompute and compare. A malformed stored hash yields `false`.
    fn verify(&self, plaintext: &str, hash: &str) -> bool;

    /// A well-formed digest of a secret nobody knows, computed with the same
    /// cost parameters as real hashes.
    ///
    /// Verifying against it costs as much as verifying a real account, which
    /// keeps "unknown user" and "wrong password" indistinguishable by timing.
    fn dummy_hash(&self) -> &str;
}

/// Argon2id hasher.
#[derive(Clone)]
pub struct Argon2PasswordHasher {
    params: Params,
    dummy: String,
}

impl Argon2PasswordHasher {
    /// Hasher with the crate's default (OWASP-recommended) Argon2id parameters.
    pub fn new() -> Result<Self, PasswordHashError> {
        Self::from_params(Params::default())
    }

    /// Hasher with explicit cost parameters.
    ///
    /// `m_cost` is in KiB. Low values are only appropriate for tests.
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, PasswordHashError> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| PasswordHashError::InvalidParams(e.to_string()))?;
        Self::from_params(params)
    }

    fn from_params(params: Params) -> Result<Self, PasswordHashError> {
        let mut hasher = Self {
            params,
            dummy: String::new(),
        };

        let mut secret = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut secret)
            .map_err(|e| PasswordHashError::Hashing(e.to_string()))?;
        let secret: String = secret.iter().map(|b| format!("{b:02x}")).collect();
        hasher.dummy = hasher.hash(&secret)?;

        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl core::fmt::Debug for Argon2PasswordHasher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Argon2PasswordHasher")
            .field("m_cost", &self.params.m_cost())
            .field("t_cost", &self.params.t_cost())
            .field("p_cost", &self.params.p_cost())
            .finish()
    }
}

impl PasswordHasher for Argon2PasswordHasher {
    fn hash(&self, plaintext: &str) -> Result<String, PasswordHashError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordHashError::Hashing(e.to_string()))
    }

    fn verify(&self, plaintext: &str, hash: &str) -> bool {
        // Cost parameters come from the PHC string, not from `self.params`.
        PasswordHash::new(hash)
            .map(|parsed| {
                self.argon2()
                    .verify_password(plaintext.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    }

    fn dummy_hash(&self) -> &str {
        &self.dummy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cheap_hasher() -> Argon2PasswordHasher {
        Argon2PasswordHasher::with_params(8, 1, 1).unwrap()
    }

    #[test]
    fn hash_is_salted() {
        let hasher = cheap_hasher();
        let a = hasher.hash("correct horse").unwrap();
        let b = hasher.hash("correct horse").unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("$argon2id$"));
    }

    #[test]
    fn hash_never_contains_plaintext() {
        let hasher = cheap_hasher();
        let hash = hasher.hash("ward-7-password").unwrap();
        assert!(!hash.contains("ward-7-password"));
    }

    #[test]
    fn malformed_hash_verifies_false() {
        let hasher = cheap_hasher();
        assert!(!hasher.verify("anything", "not-a-phc-string"));
        assert!(!hasher.verify("anything", ""));
    }

    #[test]
    fn dummy_hash_is_well_formed_and_rejects_guesses() {
        let hasher = cheap_hasher();
        assert!(PasswordHash::new(hasher.dummy_hash()).is_ok());
        assert!(!hasher.verify("", hasher.dummy_hash()));
        assert!(!hasher.verify("password", hasher.dummy_hash()));
    }

    #[test]
    fn invalid_params_are_rejected() {
        let err = Argon2PasswordHasher::with_params(0, 0, 0).unwrap_err();
        assert!(matches!(err, PasswordHashError::InvalidParams(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 16,
            ..ProptestConfig::default()
        })]

        /// Property: verify accepts exactly the plaintext that was hashed.
        #[test]
        fn verify_accepts_only_the_original(
            original in ".{0,24}",
            other in ".{0,24}",
        ) {
            let hasher = cheap_hasher();
            let hash = hasher.hash(&original).unwrap();
            prop_assert!(hasher.verify(&original, &hash));
            if other != original {
                prop_assert!(!hasher.verify(&other, &hash));
            }
        }
    }
}
