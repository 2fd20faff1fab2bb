//! Identifier types for maji-billing.
//!
//! Meter numbers, user ids and provider correlation ids arrive as free-form strings from
//! devices, the mobile app and M-Pesa. Records created by this service (alerts, telemetry log
//! entries) use ULIDs so they sort by creation time.
//!
//! # Macro-based ID Types
//!
//! `string_id_type!` and `ulid_id_type!` keep serialization, parsing and display consistent
//! across every identifier.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Maximum accepted length for string identifiers.
pub const MAX_ID_LEN: usize = 128;

/// Define a validated string identifier.
///
/// Values are trimmed; empty values, values longer than [`MAX_ID_LEN`] and values containing
/// control characters are rejected. The last rule keeps ids safe to embed in store keys.
macro_rules! string_id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parse and validate an identifier.
            ///
            /// # Errors
            ///
            /// Returns an error if the value is empty, too long or contains control characters.
            pub fn new(value: impl AsRef<str>) -> Result<Self, IdError> {
                let value = value.as_ref().trim();
                if value.is_empty() {
                    return Err(IdError::Empty);
                }
                if value.len() > MAX_ID_LEN {
                    return Err(IdError::TooLong(value.len()));
                }
                if value.chars().any(char::is_control) {
                    return Err(IdError::InvalidCharacter);
                }
                Ok(Self(value.to_string()))
            }

            /// Return the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                self.0.as_bytes()
            }
        }
    };
}

/// Define a ULID-based identifier for records created by this service.
macro_rules! ulid_id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(Ulid);

        impl $name {
            /// Generate a new identifier with the current timestamp.
            #[must_use]
            pub fn generate() -> Self {
                Self(Ulid::new())
            }

            /// Return the bytes of the ULID (16 bytes, big-endian, time-ordered).
            #[must_use]
            pub fn to_bytes(&self) -> [u8; 16] {
                self.0.to_bytes()
            }

            /// Create an identifier from its byte representation.
            #[must_use]
            pub fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(Ulid::from_bytes(bytes))
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let ulid = Ulid::from_string(s).map_err(|_| IdError::InvalidUlid)?;
                Ok(Self(ulid))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0.to_string()
            }
        }
    };
}

string_id_type!(MeterId, "A water meter number.\n\nMeter numbers key the balance record and are sent to M-Pesa as the account reference.");
string_id_type!(UserId, "An app user identifier, as issued by the mobile app's identity provider.");
string_id_type!(CheckoutRequestId, "The M-Pesa `CheckoutRequestID` correlating an STK push with its callback.");

ulid_id_type!(AlertId, "An alert identifier (ULID, time-ordered).");
ulid_id_type!(LogEntryId, "A telemetry log entry identifier (ULID, time-ordered).");

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The identifier is empty after trimming.
    #[error("identifier is empty")]
    Empty,

    /// The identifier exceeds [`MAX_ID_LEN`].
    #[error("identifier too long: {0} bytes")]
    TooLong(usize),

    /// The identifier contains a control character.
    #[error("identifier contains a control character")]
    InvalidCharacter,

    /// The input is not a valid ULID.
    #[error("invalid ULID format")]
    InvalidUlid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meter_id_is_trimmed() {
        let id = MeterId::new("  MTR1 ").unwrap();
        assert_eq!(id.as_str(), "MTR1");
    }

    #[test]
    fn meter_id_rejects_empty_and_control_chars() {
        assert_eq!(MeterId::new("   "), Err(IdError::Empty));
        assert_eq!(MeterId::new("MTR\u{0}1"), Err(IdError::InvalidCharacter));
        assert!(matches!(
            MeterId::new("x".repeat(MAX_ID_LEN + 1)),
            Err(IdError::TooLong(_))
        ));
    }

    #[test]
    fn string_ids_deserialize_with_validation() {
        let id: UserId = serde_json::from_str("\"user-42\"").unwrap();
        assert_eq!(id.to_string(), "user-42");
        assert!(serde_json::from_str::<UserId>("\"\"").is_err());
    }

    #[test]
    fn alert_ids_are_time_ordered() {
        let first = AlertId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = AlertId::generate();
        assert!(first < second);
        assert!(first.to_bytes() < second.to_bytes());
    }

    #[test]
    fn log_entry_id_parses_its_display_form() {
        let id = LogEntryId::generate();
        let parsed: LogEntryId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert_eq!(LogEntryId::from_bytes(id.to_bytes()), id);
    }
}
