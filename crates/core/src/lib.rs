//! Shared primitives for all Rust crates in Mellon.

#![forbid(unsafe_code)]

/// Principal identity primitives shared across services.
pub mod identity;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use identity::PrincipalIdentity;

/// Result type used across Mellon crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for NonEmptyString {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl std::fmt::Display for NonEmptyString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Error categories of the access-grant lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// Invalid input or violated invariant; user-correctable.
    #[error("validation error: {0}")]
    Validation(String),

    /// Callback references a request that does not exist.
    #[error("unknown request: {0}")]
    UnknownRequest(String),

    /// Inbound callback payload lacks required fields.
    #[error("malformed callback: {0}")]
    MalformedCallback(String),

    /// Risk oracle could not produce a decision.
    #[error("classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    /// Identity directory mutation or lookup failed.
    #[error("remote mutation failure: {0}")]
    RemoteMutation(String),

    /// Outbound notification could not be delivered.
    #[error("notification send failure: {0}")]
    NotificationSend(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::{AppError, NonEmptyString};

    #[test]
    fn non_empty_string_rejects_whitespace() {
        let result = NonEmptyString::new("   ");
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn non_empty_string_deserialization_validates() {
        let parsed = serde_json::from_str::<NonEmptyString>("\"\"");
        assert!(parsed.is_err());

        let parsed = serde_json::from_str::<NonEmptyString>("\"fix TICKET-101\"");
        assert_eq!(
            parsed.map(String::from).unwrap_or_default(),
            "fix TICKET-101"
        );
    }
}
