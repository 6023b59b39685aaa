//! Password hashing with Argon2id.
//!
//! Hashes are stored as PHC strings, so verification reads its parameters
//! from the hash and keeps working after the cost settings change.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as Argon2Hasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use super::AuthError;

#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self { params: Params::default() }
    }
}

impl PasswordHasher {
    /// Custom cost; tests use a cheap setting
    pub fn new(memory_cost_kib: u32, time_cost: u32, parallelism: u32) -> Result<Self, AuthError> {
        let params = Params::new(memory_cost_kib, time_cost, parallelism, None)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;
        Ok(Self { params })
    }

    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Constant-time check of `password` against a stored hash
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(hash).map_err(|e| AuthError::Hashing(e.to_string()))?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::Hashing(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hasher = PasswordHasher::new(1024, 1, 1).unwrap();
        let hash = hasher.hash("pass1234").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("pass1234", &hash).unwrap());
        assert!(!hasher.verify("pass12345", &hash).unwrap());
        assert!(hasher.verify("pass1234", "garbage").is_err());
    }

    #[test]
    fn salts_differ() {
        let hasher = PasswordHasher::new(1024, 1, 1).unwrap();
        assert_ne!(hasher.hash("same-password").unwrap(), hasher.hash("same-password").unwrap());
    }
}
