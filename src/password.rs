//! Salted one-way password hashing (argon2id, PHC string format).

use argon2::password_hash::{
    self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;

use super::error::{Error, Result};

pub fn hash(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::PasswordHash(e.to_string()))
}

/// Checks `password` against a stored PHC hash. The comparison is constant-time.
pub fn verify(password: &str, stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| Error::PasswordHash(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(Error::PasswordHash(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_the_exact_password() {
        let stored = hash("Hunter2").unwrap();

        assert_ne!(stored, "Hunter2");
        assert!(stored.starts_with("$argon2"));
        assert!(verify("Hunter2", &stored).unwrap());
        assert!(!verify("hunter2", &stored).unwrap());
        assert!(!verify("", &stored).unwrap());
    }

    #[test]
    fn same_password_gets_a_fresh_salt() {
        assert_ne!(hash("pale ale").unwrap(), hash("pale ale").unwrap());
    }

    #[test]
    fn malformed_stored_hash_is_an_error() {
        assert!(verify("admin", "admin").is_err());
    }
}
