//! Account types.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AccountId;

/// Advisory role tag. Roles are labels for presentation, not access-control
/// boundaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    Referee,
    FirstDegree,
    Referral,
    Administrator,
    /// Created as a byproduct of being referenced; has never signed in.
    Unregistered,
}

/// Error type for parsing AccountRole from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseAccountRoleError(pub String);

impl std::fmt::Display for ParseAccountRoleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid account role: {}", self.0)
    }
}

impl std::error::Error for ParseAccountRoleError {}

impl FromStr for AccountRole {
    type Err = ParseAccountRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "referee" => Ok(AccountRole::Referee),
            "first_degree" => Ok(AccountRole::FirstDegree),
            "referral" => Ok(AccountRole::Referral),
            "administrator" => Ok(AccountRole::Administrator),
            "unregistered" => Ok(AccountRole::Unregistered),
            _ => Err(ParseAccountRoleError(s.to_string())),
        }
    }
}

impl AccountRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountRole::Referee => "referee",
            AccountRole::FirstDegree => "first_degree",
            AccountRole::Referral => "referral",
            AccountRole::Administrator => "administrator",
            AccountRole::Unregistered => "unregistered",
        }
    }
}

/// A person known to the system.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub email: Option<String>, // Lowercased, unique when present
    pub phone: Option<String>, // Unique when present
    pub handle: Option<String>,
    pub role: AccountRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Whether the account has a channel it could authenticate through.
    pub fn is_addressable(&self) -> bool {
        self.email.is_some() || self.phone.is_some()
    }

    /// Preferred single contact channel to disclose (email, else phone).
    pub fn contact_channel(&self) -> Option<&str> {
        self.email.as_deref().or(self.phone.as_deref())
    }
}

/// Parameters for creating an account
#[derive(Clone, Debug)]
pub struct CreateAccountParams {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub handle: Option<String>,
    pub role: AccountRole,
}

/// Parameters for taking over an `unregistered` placeholder account.
///
/// `name`, `handle` and `role` replace the stored values. `email` and `phone`
/// only fill channels the placeholder does not have yet.
#[derive(Clone, Debug)]
pub struct ClaimAccountParams {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub handle: Option<String>,
    pub role: AccountRole,
}
