//! Referral chain types.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, ReferralId};

/// Referral status. `Approved` and `Denied` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    Pending,
    Approved,
    Denied,
}

/// Error type for parsing ReferralStatus from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseReferralStatusError(pub String);

impl std::fmt::Display for ParseReferralStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid referral status: {}", self.0)
    }
}

impl std::error::Error for ParseReferralStatusError {}

impl FromStr for ReferralStatus {
    type Err = ParseReferralStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReferralStatus::Pending),
            "approved" => Ok(ReferralStatus::Approved),
            "denied" => Ok(ReferralStatus::Denied),
            _ => Err(ParseReferralStatusError(s.to_string())),
        }
    }
}

impl ReferralStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferralStatus::Pending => "pending",
            ReferralStatus::Approved => "approved",
            ReferralStatus::Denied => "denied",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReferralStatus::Pending)
    }
}

/// One edge in the referee -> first-degree -> referral chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferralRecord {
    pub id: ReferralId,
    pub referee_id: AccountId,
    pub first_degree_id: AccountId,
    pub referral_id: AccountId,
    pub status: ReferralStatus,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

/// Parameters for creating a referral record (always starts pending)
#[derive(Clone, Debug)]
pub struct CreateReferralParams {
    pub referee_id: AccountId,
    pub first_degree_id: AccountId,
    pub referral_id: AccountId,
}
