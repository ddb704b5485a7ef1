use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{AppError, AppResult};

/// Identity of a human principal as known to the messaging platform and the
/// identity directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PrincipalIdentity(String);

impl PrincipalIdentity {
    /// Creates a principal identity from a non-empty login or email.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into().trim().to_owned();
        if value.is_empty() {
            return Err(AppError::Validation(
                "principal identity must not be empty".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Qualifies a bare platform handle with a login domain.
    ///
    /// Values that already carry an `@` are kept as-is.
    pub fn qualified(value: &str, login_domain: Option<&str>) -> AppResult<Self> {
        match login_domain {
            Some(domain)
                if !value.trim().is_empty()
                    && !value.contains('@')
                    && !domain.trim().is_empty() =>
            {
                Self::new(format!("{}@{}", value.trim(), domain.trim()))
            }
            _ => Self::new(value),
        }
    }

    /// Returns the login used against the identity directory.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for PrincipalIdentity {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PrincipalIdentity> for String {
    fn from(value: PrincipalIdentity) -> Self {
        value.0
    }
}

impl Display for PrincipalIdentity {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::PrincipalIdentity;

    #[test]
    fn qualified_appends_login_domain_to_bare_handles() {
        let principal = PrincipalIdentity::qualified("jake", Some("madeforsapiens.com"));
        assert_eq!(
            principal.map(String::from).unwrap_or_default(),
            "jake@madeforsapiens.com"
        );
    }

    #[test]
    fn qualified_keeps_existing_email() {
        let principal = PrincipalIdentity::qualified("alice@example.com", Some("other.org"));
        assert_eq!(
            principal.map(String::from).unwrap_or_default(),
            "alice@example.com"
        );
    }

    #[test]
    fn blank_principal_is_rejected() {
        assert!(PrincipalIdentity::new("  ").is_err());
        assert!(PrincipalIdentity::qualified("", Some("example.com")).is_err());
    }
}
