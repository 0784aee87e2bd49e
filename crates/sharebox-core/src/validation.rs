//! Client-side input checks. Failures never reach the network.

use crate::api::ApiError;

/// Minimum password length accepted at registration
const MIN_PASSWORD_LENGTH: usize = 8;

/// One-time codes from authenticator apps are 6 digits; some issue 8.
const OTP_LENGTHS: [usize; 2] = [6, 8];

pub fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        Err(ApiError::Validation(format!("{} is required", field)))
    } else {
        Ok(())
    }
}

/// Loose structural check: one `@`, non-empty local part, dotted domain.
pub fn email(value: &str) -> Result<(), ApiError> {
    let value = value.trim();
    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ApiError::Validation(format!("'{}' is not a valid email address", value)))
    }
}

pub fn otp(code: &str) -> Result<(), ApiError> {
    let code = code.trim();
    if OTP_LENGTHS.contains(&code.len()) && code.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ApiError::Validation(
            "One-time code must be 6 or 8 digits".to_string(),
        ))
    }
}

pub fn password(value: &str) -> Result<(), ApiError> {
    if value.chars().count() < MIN_PASSWORD_LENGTH {
        Err(ApiError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )))
    } else {
        Ok(())
    }
}

/// A value interpolated into a URL path, such as a file id or share link.
pub fn path_segment(field: &str, value: &str) -> Result<(), ApiError> {
    require(field, value)?;
    // '%' would let an encoded dot segment through to URL joining
    if value.contains(['/', '?', '#', '\\', '%']) || value == "." || value == ".." {
        Err(ApiError::Validation(format!("{} contains invalid characters", field)))
    } else {
        Ok(())
    }
}

pub fn expires_in(hours: Option<u32>) -> Result<(), ApiError> {
    match hours {
        Some(0) => Err(ApiError::Validation(
            "Expiry must be at least one hour".to_string(),
        )),
        _ => Ok(()),
    }
}
