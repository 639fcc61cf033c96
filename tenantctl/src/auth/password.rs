//! Credential hashing and verification.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Argon2 hashing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Argon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Argon2Params {
    fn to_argon2(self) -> Result<Argon2<'static>, Error> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None).map_err(|e| Error::Internal {
            operation: format!("create argon2 params: {e}"),
        })?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Whether argon2 accepts these parameters.
    pub fn is_valid(&self) -> bool {
        Params::new(self.memory_kib, self.iterations, self.parallelism, None).is_ok()
    }
}

impl Default for Argon2Params {
    /// Argon2id RFC recommendations
    fn default() -> Self {
        Self {
            memory_kib: 19456, // 19 MB
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// One-way hashing of credentials before they reach storage.
pub trait CredentialHasher: Send + Sync + std::fmt::Debug {
    fn hash(&self, plaintext: &str) -> Result<String, Error>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Hasher {
    params: Argon2Params,
}

impl Argon2Hasher {
    pub fn new(params: Argon2Params) -> Self {
        Self { params }
    }
}

impl CredentialHasher for Argon2Hasher {
    /// PHC-format Argon2id hash with a fresh random salt.
    fn hash(&self, plaintext: &str) -> Result<String, Error> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = self.params.to_argon2()?;

        let hash = argon2.hash_password(plaintext.as_bytes(), &salt).map_err(|e| Error::Internal {
            operation: format!("hash credential: {e}"),
        })?;

        Ok(hash.to_string())
    }
}

/// Verify a string against a PHC-format hash.
///
/// Verification uses the parameters embedded in the hash itself.
pub fn verify_string(input: &str, hash: &str) -> Result<bool, Error> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| Error::Internal {
        operation: format!("parse hash: {e}"),
    })?;

    Ok(Argon2::default().verify_password(input.as_bytes(), &parsed_hash).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    // Cheap parameters so tests stay fast
    const FAST: Argon2Params = Argon2Params {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    };

    #[test]
    fn test_hash_verifies_and_hides_plaintext() {
        let hasher = Argon2Hasher::new(FAST);
        let hash = hasher.hash("correct horse battery").unwrap();

        assert_ne!(hash, "correct horse battery");
        assert!(hash.starts_with("$argon2id$v=19$"));
        assert!(verify_string("correct horse battery", &hash).unwrap());
        assert!(!verify_string("wrong horse battery", &hash).unwrap());
    }

    #[test]
    fn test_configured_params_are_embedded() {
        let hash = Argon2Hasher::new(FAST).hash("correct horse battery").unwrap();
        assert!(hash.contains("$m=1024,t=1,p=1$"));
    }

    #[test]
    fn test_same_input_different_hashes() {
        let hasher = Argon2Hasher::new(FAST);
        let hash1 = hasher.hash("same_password").unwrap();
        let hash2 = hasher.hash("same_password").unwrap();

        // Salted
        assert_ne!(hash1, hash2);
        assert!(verify_string("same_password", &hash1).unwrap());
        assert!(verify_string("same_password", &hash2).unwrap());
    }

    #[test]
    fn test_degenerate_params_are_system_errors() {
        let params = Argon2Params {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        };
        assert!(!params.is_valid());

        let err = Argon2Hasher::new(params).hash("whatever").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::System);
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        assert!(verify_string("x", "not-a-phc-string").is_err());
    }
}
