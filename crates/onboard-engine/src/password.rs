//! Argon2id password hashing for the local identity provider.
//!
//! Hashes use OWASP-recommended parameters (memory: 19 MiB, iterations:
//! 2, parallelism: 1) and a fresh random salt. An optional pepper is
//! prepended to the password for both hashing and verification.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};

use crate::error::IdentityError;

fn peppered<'a>(password: &'a str, pepper: Option<&str>, buffer: &'a mut String) -> &'a [u8] {
    match pepper {
        Some(p) => {
            *buffer = format!("{p}{password}");
            buffer.as_bytes()
        }
        None => password.as_bytes(),
    }
}

/// Hash a password into a PHC-format string.
pub fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, IdentityError> {
    let params = argon2::Params::new(19456, 2, 1, None)
        .map_err(|e| IdentityError::Crypto(format!("argon2 params error: {e}")))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut buffer = String::new();
    let input = peppered(password, pepper, &mut buffer);
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = argon2
        .hash_password(input, &salt)
        .map_err(|e| IdentityError::Crypto(format!("password hash error: {e}")))?;
    Ok(hash.to_string())
}

/// `Ok(false)` on a wrong password; `Err` only for a malformed hash.
pub fn verify_password(
    password: &str,
    hash: &str,
    pepper: Option<&str>,
) -> Result<bool, IdentityError> {
    let parsed = argon2::PasswordHash::new(hash)
        .map_err(|e| IdentityError::Crypto(format!("invalid hash format: {e}")))?;

    let mut buffer = String::new();
    let input = peppered(password, pepper, &mut buffer);
    match Argon2::default().verify_password(input, &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(IdentityError::Crypto(format!("verify error: {e}"))),
    }
}
