//! Strongly-typed identifiers (avoid mixing strings/UUIDs arbitrarily).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new time-ordered identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(
    /// Account identifier.
    AccountId
);
uuid_id!(
    /// Contact book entry identifier.
    ContactEntryId
);
uuid_id!(
    /// Referral record identifier.
    ReferralId
);
uuid_id!(
    /// Pending introduction identifier.
    IntroductionId
);
uuid_id!(
    /// Notification record identifier.
    NotificationId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_display_roundtrip() {
        let id = AccountId::new();
        let parsed: AccountId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_invalid_id_rejected() {
        assert!("not-a-uuid".parse::<ReferralId>().is_err());
    }

    #[test]
    fn test_new_ids_are_v7() {
        let id = IntroductionId::new();
        assert_eq!(id.0.get_version_num(), 7);
    }

    #[test]
    fn test_id_debug_contains_uuid() {
        let uuid = Uuid::new_v4();
        let id = ContactEntryId(uuid);
        assert!(format!("{:?}", id).contains(&uuid.to_string()));
    }
}
