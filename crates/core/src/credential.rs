//! API key secrets and their salted hashes.
//!
//! Secrets are never stored. Each key row keeps an Argon2id PHC string with
//! its own random salt; verification re-derives the hash and compares the
//! outputs in constant time.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use uuid::Uuid;

/// Upper bound on presented secrets; anything longer is rejected unhashed.
pub const MAX_SECRET_LEN: usize = 512;

/// Generate a new random API key secret.
pub fn generate_secret() -> String {
    Uuid::new_v4().to_string()
}

/// Hash a secret for storage.
pub fn hash_secret(secret: &str) -> crate::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| crate::Error::Credential(format!("hashing failed: {e}")))
}

/// Check a presented secret against a stored hash.
///
/// Malformed stored hashes and oversized secrets verify as `false`.
pub fn verify_secret(secret: &str, stored_hash: &str) -> bool {
    if secret.is_empty() || secret.len() > MAX_SECRET_LEN {
        return false;
    }
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let secret = generate_secret();
        let hash = hash_secret(&secret).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains(&secret));
        assert!(verify_secret(&secret, &hash));
        assert!(!verify_secret("wrong", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let secret = "same-secret";
        let a = hash_secret(secret).unwrap();
        let b = hash_secret(secret).unwrap();
        assert_ne!(a, b);
        assert!(verify_secret(secret, &a));
        assert!(verify_secret(secret, &b));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        assert!(!verify_secret("secret", "not-a-phc-string"));
        assert!(!verify_secret("", "$argon2id$v=19$m=19456,t=2,p=1$abc$def"));
        let long = "x".repeat(MAX_SECRET_LEN + 1);
        let hash = hash_secret("short").unwrap();
        assert!(!verify_secret(&long, &hash));
    }

    #[test]
    fn test_generated_secrets_differ() {
        assert_ne!(generate_secret(), generate_secret());
    }
}
