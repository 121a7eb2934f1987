//! Direct introduction types.
//!
//! The aggregate [`IntroductionStatus`] is never stored. It is derived from the
//! two persisted per-side decisions every time it is read, so the flags and the
//! status cannot drift apart.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, IntroductionId};

/// Which introduced party a slot or decision refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntroductionSide {
    PersonA,
    PersonB,
}

impl IntroductionSide {
    pub fn other(&self) -> IntroductionSide {
        match self {
            IntroductionSide::PersonA => IntroductionSide::PersonB,
            IntroductionSide::PersonB => IntroductionSide::PersonA,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntroductionSide::PersonA => "person_a",
            IntroductionSide::PersonB => "person_b",
        }
    }
}

/// One side's decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideDecision {
    Undecided,
    Accepted,
    Declined,
}

/// Error type for parsing SideDecision from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSideDecisionError(pub String);

impl std::fmt::Display for ParseSideDecisionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid side decision: {}", self.0)
    }
}

impl std::error::Error for ParseSideDecisionError {}

impl FromStr for SideDecision {
    type Err = ParseSideDecisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "undecided" => Ok(SideDecision::Undecided),
            "accepted" => Ok(SideDecision::Accepted),
            "declined" => Ok(SideDecision::Declined),
            _ => Err(ParseSideDecisionError(s.to_string())),
        }
    }
}

impl SideDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            SideDecision::Undecided => "undecided",
            SideDecision::Accepted => "accepted",
            SideDecision::Declined => "declined",
        }
    }
}

/// Aggregate status of an introduction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntroductionStatus {
    Pending,
    PersonAAccepted,
    PersonBAccepted,
    BothAccepted,
    Declined,
}

impl IntroductionStatus {
    /// The only way an aggregate status is produced.
    ///
    /// `Declined` if either side declined; `BothAccepted` if both accepted;
    /// the single-sided variant if exactly one accepted; otherwise `Pending`.
    pub fn derive(person_a: SideDecision, person_b: SideDecision) -> Self {
        use SideDecision::*;
        match (person_a, person_b) {
            (Declined, _) | (_, Declined) => IntroductionStatus::Declined,
            (Accepted, Accepted) => IntroductionStatus::BothAccepted,
            (Accepted, Undecided) => IntroductionStatus::PersonAAccepted,
            (Undecided, Accepted) => IntroductionStatus::PersonBAccepted,
            (Undecided, Undecided) => IntroductionStatus::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IntroductionStatus::Declined | IntroductionStatus::BothAccepted
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntroductionStatus::Pending => "pending",
            IntroductionStatus::PersonAAccepted => "person_a_accepted",
            IntroductionStatus::PersonBAccepted => "person_b_accepted",
            IntroductionStatus::BothAccepted => "both_accepted",
            IntroductionStatus::Declined => "declined",
        }
    }
}

impl std::fmt::Display for IntroductionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-text description of an introduced person plus a weak account link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntroductionParty {
    pub name: String,
    pub email: String, // Lowercased
    pub company: Option<String>,
    pub account_id: Option<AccountId>,
    pub decision: SideDecision,
}

/// One direct introduction between Person A and Person B.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingIntroduction {
    pub id: IntroductionId,
    pub introducer_id: AccountId,
    pub person_a: IntroductionParty,
    pub person_b: IntroductionParty,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PendingIntroduction {
    /// Aggregate status, always derived from the per-side decisions.
    pub fn status(&self) -> IntroductionStatus {
        IntroductionStatus::derive(self.person_a.decision, self.person_b.decision)
    }

    pub fn party(&self, side: IntroductionSide) -> &IntroductionParty {
        match side {
            IntroductionSide::PersonA => &self.person_a,
            IntroductionSide::PersonB => &self.person_b,
        }
    }
}

/// Free-text party descriptor used when creating an introduction
#[derive(Clone, Debug)]
pub struct IntroductionPartyParams {
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub account_id: Option<AccountId>,
}

/// Parameters for creating an introduction (both sides start undecided)
#[derive(Clone, Debug)]
pub struct CreateIntroductionParams {
    pub introducer_id: AccountId,
    pub person_a: IntroductionPartyParams,
    pub person_b: IntroductionPartyParams,
    pub note: Option<String>,
}
