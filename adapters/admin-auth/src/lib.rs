//! admin-auth: credential verification for the admin API.
//!
//! Purpose
//! - Implements the `Authenticator` port from the `domain` crate.
//! - Hashed secrets are Argon2 PHC strings verified with `argon2`, whose
//!   digest comparison is constant-time.
//! - Plaintext secrets and the username are compared with `subtle`.
//!
//! API
//! - `PasswordAuthenticator::new(credential)` validates the configured secret
//!   up front, so a malformed hash is a startup error rather than a silent
//!   per-request failure.
//! - `hash_password(password)` produces a PHC string for configuration.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use domain::{AdminCredential, AdminSecret, Authenticator};
use subtle::ConstantTimeEq;
use tracing::trace;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("admin username must not be empty")]
    EmptyUsername,
    #[error("admin password must not be empty")]
    EmptySecret,
    #[error("invalid password hash: {0}")]
    InvalidHash(String),
    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Checks admin credentials against the configured username and secret.
#[derive(Clone, Debug)]
pub struct PasswordAuthenticator {
    credential: AdminCredential,
}

impl PasswordAuthenticator {
    pub fn new(credential: AdminCredential) -> Result<Self, AuthError> {
        if credential.username.is_empty() {
            return Err(AuthError::EmptyUsername);
        }
        match &credential.secret {
            AdminSecret::Hashed(hash) => {
                PasswordHash::new(hash).map_err(|e| AuthError::InvalidHash(e.to_string()))?;
            }
            AdminSecret::Plain(pw) if pw.is_empty() => return Err(AuthError::EmptySecret),
            AdminSecret::Plain(_) => {}
        }
        Ok(Self { credential })
    }

    fn check_password(&self, password: &str) -> bool {
        match &self.credential.secret {
            AdminSecret::Hashed(hash) => match PasswordHash::new(hash) {
                Ok(parsed) => Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok(),
                Err(_) => false,
            },
            AdminSecret::Plain(secret) => constant_time_eq(password, secret),
        }
    }
}

impl Authenticator for PasswordAuthenticator {
    fn authenticate(&self, username: &str, password: &str) -> bool {
        let user_ok = constant_time_eq(username, &self.credential.username);
        // Always run the password check so timing does not reveal the username.
        let pass_ok = self.check_password(password);
        if !user_ok {
            trace!("admin-auth: username mismatch");
        }
        user_ok && pass_ok
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Hash a password into an Argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}
