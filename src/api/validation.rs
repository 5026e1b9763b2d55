//! Input validation for API requests.
//!
//! Each function checks one field and returns a human-readable message on
//! failure. Handlers collect the results with `ValidationErrorBuilder` from
//! the `error` module so a request reports all bad fields at once.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Pragmatic email check: something@domain.tld, no whitespace
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^\s@]+@[^\s@]+\.[^\s@]+$"
    ).unwrap();

    /// Optional leading +, then digits with spaces or dashes (7-15 digits)
    static ref PHONE_REGEX: Regex = Regex::new(
        r"^\+?[0-9][0-9 \-]{5,18}[0-9]$"
    ).unwrap();
}

const MAX_EMAIL_LEN: usize = 254;
const MAX_NAME_LEN: usize = 100;
const MAX_PASSWORD_LEN: usize = 256;
const MAX_IMAGE_LEN: usize = 2048;

/// Canonical form used to store and look up emails
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > MAX_EMAIL_LEN {
        return Err(format!(
            "Email is too long (max {} characters)",
            MAX_EMAIL_LEN
        ));
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate a password. Only length limits are enforced.
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.chars().count() > MAX_PASSWORD_LEN {
        return Err(format!(
            "Password is too long (max {} characters)",
            MAX_PASSWORD_LEN
        ));
    }

    Ok(())
}

/// Validate a display or resource name
pub fn validate_name(name: &str) -> Result<(), String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Name is required".to_string());
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(format!("Name is too long (max {} characters)", MAX_NAME_LEN));
    }

    Ok(())
}

/// Validate an optional phone number
pub fn validate_phone(phone: &Option<String>) -> Result<(), String> {
    if let Some(p) = phone {
        let p = p.trim();
        if p.is_empty() {
            return Ok(()); // Empty string treated as no phone
        }

        if !PHONE_REGEX.is_match(p) {
            return Err("Invalid phone number".to_string());
        }

        let digits = p.chars().filter(|c| c.is_ascii_digit()).count();
        if !(7..=15).contains(&digits) {
            return Err("Phone number must have between 7 and 15 digits".to_string());
        }
    }
    Ok(())
}

/// Validate an optional image reference
pub fn validate_image(image: &Option<String>) -> Result<(), String> {
    if let Some(i) = image {
        if i.len() > MAX_IMAGE_LEN {
            return Err(format!(
                "Image is too long (max {} characters)",
                MAX_IMAGE_LEN
            ));
        }
    }
    Ok(())
}

/// Validate a price in minor currency units
pub fn validate_price(price: i64) -> Result<(), String> {
    if price < 0 {
        return Err("Price must not be negative".to_string());
    }
    Ok(())
}

/// Validate that an id reference is present
pub fn validate_reference(id: &str, field_name: &str) -> Result<(), String> {
    if id.trim().is_empty() {
        return Err(format!("{} is required", field_name));
    }
    Ok(())
}
