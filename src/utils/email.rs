use regex::Regex;
use std::sync::LazyLock;

use crate::error::IdentityError;

// Email regex pattern - practical validation for common email formats
// Allows: alphanumeric, dots, underscores, hyphens, plus signs in local part
// Requires: at least one dot in domain part (e.g., example.com)
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$"
    ).expect("Invalid email regex pattern")
});

/// Validate an email address format
/// 
/// # Arguments
/// * `email` - The email address to validate
/// 
/// # Returns
/// * `Ok(())` - If the email format is valid
/// * `Err(IdentityError::WeakPassword)` - If the email format is invalid
/// 
/// # Requirements
/// - 1.3: Reject registration with invalid email format
pub fn validate_email(email: &str) -> Result<(), IdentityError> {
    // Check for empty email
    if email.is_empty() {
        return Err(IdentityError::WeakPassword);
    }
    
    // Check length constraints (max 254 characters per RFC 5321)
    if email.len() > 254 {
        return Err(IdentityError::WeakPassword);
    }
    
    // Check local part length (max 64 characters)
    if let Some(at_pos) = email.find('@') {
        let local_part = &email[..at_pos];
        if local_part.len() > 64 {
            return Err(IdentityError::WeakPassword);
        }
        
        // Check for leading/trailing dots in local part
        if local_part.starts_with('.') || local_part.ends_with('.') {
            return Err(IdentityError::WeakPassword);
        }
        
        // Check for consecutive dots in local part
        if local_part.contains("..") {
            return Err(IdentityError::WeakPassword);
        }
    }
    
    // Validate against regex pattern
    if !EMAIL_REGEX.is_match(email) {
        return Err(IdentityError::WeakPassword);
    }
    
    Ok(())
}
