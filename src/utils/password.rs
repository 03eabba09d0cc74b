use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::IdentityError;

/// Minimum password length (§4.A).
pub const MIN_PASSWORD_LENGTH: usize = 12;

/// A small blacklist of passwords rejected outright even when they pass the
/// character-class checks.
const COMMON_PASSWORDS: &[&str] = &[
    "password123!",
    "password1234",
    "qwertyuiop123",
    "letmein12345!",
    "admin12345678",
];

/// Enforce the password policy: length >= 12, at least one upper/lower/digit/symbol,
/// not a blacklisted common password.
pub fn validate_password_policy(password: &str) -> Result<(), IdentityError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(IdentityError::WeakPassword);
    }

    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password.chars().any(|c| !c.is_ascii_alphanumeric());

    if !(has_upper && has_lower && has_digit && has_symbol) {
        return Err(IdentityError::WeakPassword);
    }

    if COMMON_PASSWORDS.contains(&password) {
        return Err(IdentityError::WeakPassword);
    }

    Ok(())
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String, IdentityError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| IdentityError::StoreError(format!("password hashing failed: {e}")))
}

/// Verify a password against a stored Argon2id hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, IdentityError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| IdentityError::StoreError(format!("invalid password hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn policy_never_accepts_below_min_length(password in "[A-Za-z0-9!@#$%]{0,11}") {
            prop_assert!(validate_password_policy(&password).is_err());
        }

        #[test]
        fn policy_accepts_any_password_with_all_classes_and_min_length(suffix in "[A-Za-z0-9]{8,40}") {
            let password = format!("Aa1!{suffix}");
            prop_assume!(!COMMON_PASSWORDS.contains(&password.as_str()));
            prop_assert!(validate_password_policy(&password).is_ok());
        }

        #[test]
        fn hash_then_verify_roundtrips_for_any_valid_password(suffix in "[A-Za-z0-9]{8,40}") {
            let password = format!("Aa1!{suffix}");
            let hash = hash_password(&password).unwrap();
            prop_assert!(verify_password(&password, &hash).unwrap());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_produces_valid_hash() {
        let password = "Sup3r!Secret99";
        let hash = hash_password(password).unwrap();
        assert!(!hash.is_empty());
        assert!(hash.starts_with("$argon2"));
    }

    #[test]
    fn test_hash_password_not_equal_to_plain_text() {
        let password = "Sup3r!Secret99";
        let hash = hash_password(password).unwrap();
        assert_ne!(password, hash);
    }

    #[test]
    fn test_verify_password_correct() {
        let password = "Sup3r!Secret99";
        let hash = hash_password(password).unwrap();
        assert!(verify_password(password, &hash).unwrap());
    }

    #[test]
    fn test_verify_password_incorrect() {
        let hash = hash_password("Sup3r!Secret99").unwrap();
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_hash_password_different_salts() {
        let password = "Sup3r!Secret99";
        let hash1 = hash_password(password).unwrap();
        let hash2 = hash_password(password).unwrap();
        assert_ne!(hash1, hash2);
        assert!(verify_password(password, &hash1).unwrap());
        assert!(verify_password(password, &hash2).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash_format() {
        assert!(verify_password("test", "not_a_valid_hash").is_err());
    }

    #[test]
    fn test_policy_rejects_short_password() {
        assert!(validate_password_policy("Sh0rt!").is_err());
    }

    #[test]
    fn test_policy_rejects_missing_symbol() {
        assert!(validate_password_policy("NoSymbolHere123").is_err());
    }

    #[test]
    fn test_policy_rejects_missing_digit() {
        assert!(validate_password_policy("NoDigitsHere!!").is_err());
    }

    #[test]
    fn test_policy_accepts_valid_password() {
        assert!(validate_password_policy("S3cret!pass1!").is_ok());
    }

    #[test]
    fn test_policy_rejects_blacklisted_password() {
        assert!(validate_password_policy("password123!").is_err());
    }
}
