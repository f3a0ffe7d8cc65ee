//! Defines the token stored in the auth cookie and how to serialize/deserialize it.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::auth::UserID;

/// A token for authorization and authentication.
///
/// The token is serialized as JSON into a private (encrypted and signed)
/// cookie, so clients can neither read nor forge it.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct Token {
    /// The logged in user, i.e. the caller identity handed to the core operations.
    pub user_id: UserID,

    /// When the token stops being accepted.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl Token {
    /// Whether the token is still valid at `now`.
    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use time::{Duration, macros::datetime};

    use crate::auth::{UserID, token::Token};

    #[test]
    fn serialise_token() {
        let token = Token {
            user_id: UserID::new(1),
            expires_at: datetime!(2025-12-21 00:00:00 UTC),
        };
        let expected = r#"{"user_id":1,"expires_at":"2025-12-21T00:00:00Z"}"#;

        let actual = serde_json::to_string(&token).unwrap();

        assert_eq!(expected, actual);
    }

    #[test]
    fn deserialise_token() {
        let expected = Token {
            user_id: UserID::new(7),
            expires_at: datetime!(2025-12-21 03:54:00 UTC),
        };
        let token_string = r#"{"user_id":7,"expires_at":"2025-12-21T03:54:00Z"}"#;

        let actual: Token = serde_json::from_str(token_string).unwrap();

        assert_eq!(expected, actual);
    }

    #[test]
    fn token_expires() {
        let expires_at = datetime!(2025-12-21 03:54:00 UTC);
        let token = Token {
            user_id: UserID::new(1),
            expires_at,
        };

        assert!(token.is_valid_at(expires_at - Duration::seconds(1)));
        assert!(!token.is_valid_at(expires_at));
    }
}
