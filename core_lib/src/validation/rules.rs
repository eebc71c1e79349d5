//! Validation rules
//!
//! These are pure functions. They say nothing about whether a user or file
//! actually exists; that is decided later by the store or the filesystem.

use lazy_static::lazy_static;
use regex::Regex;

use super::ValidationError;

lazy_static! {
    // Deliberately permissive: one `@`, no whitespace, a dot somewhere in
    // the domain part. Not an RFC 5322 parser.
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^\s@]+@[^\s@]+\.[^\s@]+$"
    ).unwrap();

    static ref FILE_NAME_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9._-]+$"
    ).unwrap();
}

/// Parses a base-10 user id. The whole token must be consumed: an optional
/// leading `-` followed by ASCII digits that fit in an `i64`.
pub fn validate_user_id(raw: &str) -> Result<i64, ValidationError> {
    let digits = raw.strip_prefix('-').unwrap_or(raw);

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidUserId);
    }

    raw.parse::<i64>().map_err(|_| ValidationError::InvalidUserId)
}

pub fn validate_email(raw: &str) -> bool {
    EMAIL_REGEX.is_match(raw)
}

/// Character allow-list for served file names. This does not make a path
/// safe on its own; `FileManager::resolve` still performs containment.
pub fn validate_file_name(raw: &str) -> bool {
    FILE_NAME_REGEX.is_match(raw) && !raw.contains("..")
}
