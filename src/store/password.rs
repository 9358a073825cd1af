//! Password policy and argon2id hashing.

use anyhow::anyhow;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use super::StoreError;

const MIN_PASSWORD_LENGTH: usize = 8;

/// Check the password policy: at least 8 characters with an uppercase
/// letter, a lowercase letter, and a digit. Returns every violated rule so
/// callers can report them all at once.
pub fn validate_policy(password: &str) -> Result<(), Vec<String>> {
    let mut violations = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        violations.push(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        violations.push("Password must contain an uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        violations.push("Password must contain a lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        violations.push("Password must contain a digit".to_string());
    }
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

/// Hash a password with argon2id and a fresh random salt, producing a PHC
/// string for storage.
pub fn hash(password: &str) -> Result<String, StoreError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {err}"))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored PHC string. A malformed stored hash is
/// an internal error, not a mismatch.
pub fn verify(password: &str, stored_hash: &str) -> Result<bool, StoreError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|err| anyhow!("stored password hash is malformed: {err}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_accepts_compliant_password() {
        assert!(validate_policy("Sup3rSecret").is_ok());
    }

    #[test]
    fn policy_reports_every_violation() {
        let violations = validate_policy("short").unwrap_err();
        assert_eq!(violations.len(), 3);
    }

    #[test]
    fn policy_requires_digit() {
        let violations = validate_policy("NoDigitsHere").unwrap_err();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("digit"));
    }

    #[test]
    fn hash_then_verify_round_trip() -> anyhow::Result<()> {
        let stored = hash("Sup3rSecret")?;
        assert!(stored.starts_with("$argon2id$"));
        assert!(verify("Sup3rSecret", &stored)?);
        assert!(!verify("WrongPassw0rd", &stored)?);
        Ok(())
    }

    #[test]
    fn verify_rejects_malformed_hash() {
        assert!(verify("Sup3rSecret", "not-a-phc-string").is_err());
    }
}
