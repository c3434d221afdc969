//! Password hashing and the per-request caller context.

use crate::repositories::users::{Role, User};
use sha2::{Digest, Sha256};

/// Hashes a password as lowercase hex SHA-256.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Compares `password` against a stored hash.
///
/// The comparison always walks the full length of both strings.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let candidate = hash_password(password);
    if candidate.len() != stored_hash.len() {
        return false;
    }
    candidate
        .bytes()
        .zip(stored_hash.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// The authenticated caller of an operation.
///
/// Built once per request from an authenticated [`User`] and passed explicitly to whatever needs
/// to know who is acting; nothing about the caller is held in process-wide state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    pub username: String,
    pub role: Role,
}

impl RequestContext {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }

    /// Admins and doctors may act on any patient.
    pub fn is_staff(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Doctor)
    }
}

impl From<&User> for RequestContext {
    fn from(user: &User) -> Self {
        Self::new(user.username.as_str(), user.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_is_hex_sha256() {
        assert_eq!(
            hash_password("admin123"),
            "240be518fabd2724ddb6f04eeb1da5967448d7e831c08c8fa822809f74c720a9"
        );
    }

    #[test]
    fn test_verify_password() {
        let stored = hash_password("doctor123");
        assert!(verify_password("doctor123", &stored));
        assert!(!verify_password("doctor124", &stored));
        assert!(!verify_password("doctor123", "short"));
    }

    #[test]
    fn test_is_staff() {
        assert!(RequestContext::new("admin", Role::Admin).is_staff());
        assert!(RequestContext::new("doctor", Role::Doctor).is_staff());
        assert!(!RequestContext::new("patient", Role::Patient).is_staff());
    }
}
