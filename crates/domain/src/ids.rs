use std::fmt::{Display, Formatter};
use std::str::FromStr;

use mellon_core::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID value.
            #[must_use]
            pub fn from_uuid(value: Uuid) -> Self {
                Self(value)
            }

            /// Returns the underlying UUID value.
            #[must_use]
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Parses a transport value into an identifier.
            pub fn from_transport(value: &str) -> Result<Self, AppError> {
                Self::from_str(value)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(value.trim()).map(Self).map_err(|error| {
                    AppError::Validation(format!("invalid {} '{value}': {error}", $label))
                })
            }
        }
    };
}

uuid_identifier!(
    /// Opaque access request token, also used as the notification correlation token.
    RequestId,
    "request id"
);

uuid_identifier!(
    /// Unique grant identifier.
    GrantId,
    "grant id"
);

uuid_identifier!(
    /// Revocation job identifier owned by the scheduler.
    RevocationJobId,
    "revocation job id"
);

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{GrantId, RequestId};

    #[test]
    fn request_id_roundtrips_through_transport_value() {
        let request_id = RequestId::new();
        let parsed = RequestId::from_transport(request_id.to_string().as_str());
        assert_eq!(parsed.ok(), Some(request_id));
    }

    #[test]
    fn malformed_identifier_is_rejected() {
        assert!(GrantId::from_str("approve_jake@example.com").is_err());
    }
}
