//! # Error Handling
//!
//! Provides the `AppError` enum for configuration and registration failures.
//!
//! These are programmer errors discovered while an API is being assembled
//! (bad field metadata, conflicting routes, unreadable config files). They are
//! never produced while a request is being processed: per-request problems are
//! collected into a [`crate::ValidateResult`] instead.

use derive_more::{Display, From};

/// The Global Error Enum.
///
/// We use `derive_more` for boilerplate.
/// Note: String errors default to `General`.
#[derive(Debug, Display, From)]
pub enum AppError {
    /// Wrapper for standard IO errors.
    #[display("IO Error: {_0}")]
    Io(std::io::Error),

    /// A type or operation could not be registered.
    #[from(ignore)]
    #[display("Registration Error: {_0}")]
    Registration(String),

    /// Configuration could not be loaded or is inconsistent.
    #[from(ignore)]
    #[display("Config Error: {_0}")]
    Config(String),

    /// Generic errors.
    #[display("General Error: {_0}")]
    General(String),
}

/// Manual implementation of the standard Error trait.
impl std::error::Error for AppError {}

/// Helper type alias for Result using AppError.
pub type AppResult<T> = Result<T, AppError>;
