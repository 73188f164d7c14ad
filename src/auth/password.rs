//! Credential verification with Argon2id
//!
//! Hashes are PHC strings carrying their own salt and parameters, so a hash
//! produced under one parameter set still verifies after the defaults change.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;

use crate::error::{Result, VetClinicError};

/// Hashes and verifies account passwords
#[derive(Clone, Default)]
pub struct CredentialVerifier {
    argon2: Argon2<'static>,
}

impl CredentialVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hashes a plaintext secret with a fresh random salt
    pub fn hash(&self, plaintext: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| VetClinicError::HashingError(e.to_string()))
    }

    /// Checks a plaintext secret against a stored hash. An unparsable hash never verifies.
    pub fn verify(&self, plaintext: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(_) => {
                log::warn!("Stored credential hash could not be parsed");
                return false;
            }
        };
        self.argon2
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let verifier = CredentialVerifier::new();
        let hash = verifier.hash("secret").unwrap();

        assert!(verifier.verify("secret", &hash));
        assert!(!verifier.verify("Secret", &hash));
        assert!(!hash.contains("secret"));
    }

    #[test]
    fn test_salts_differ_per_call() {
        let verifier = CredentialVerifier::new();
        let first = verifier.hash("secret").unwrap();
        let second = verifier.hash("secret").unwrap();

        assert_ne!(first, second);
        assert!(verifier.verify("secret", &first));
        assert!(verifier.verify("secret", &second));
    }

    #[test]
    fn test_garbage_hash_never_verifies() {
        let verifier = CredentialVerifier::new();
        assert!(!verifier.verify("secret", "not-a-phc-string"));
        assert!(!verifier.verify("", ""));
    }
}
