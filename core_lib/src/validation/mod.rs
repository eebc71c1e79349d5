//! Input validators for path ids, email addresses and file names

pub mod rules;

pub use rules::{validate_email, validate_file_name, validate_user_id};

use thiserror::Error;

/// A malformed client input. The message is exactly what the client sees.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid user ID")]
    InvalidUserId,

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Invalid file name")]
    InvalidFileName,
}
