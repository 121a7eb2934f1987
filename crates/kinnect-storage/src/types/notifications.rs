//! Notification audit record types.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, NotificationId};

/// What triggered an outbound message. Also selects the template.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Referee asks a first-degree contact to make introductions.
    OutreachRequest,
    /// First-degree has referred a target; target is asked to approve.
    ReferralRequest,
    ReferralApprovedReferee,
    ReferralApprovedFirstDegree,
    ReferralApprovedReferral,
    ReferralDeniedReferee,
    /// Both parties of a direct introduction are asked to respond.
    IntroductionRequest,
    IntroductionMutual,
    MagicLink,
}

/// Error type for parsing NotificationKind from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseNotificationKindError(pub String);

impl std::fmt::Display for ParseNotificationKindError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid notification kind: {}", self.0)
    }
}

impl std::error::Error for ParseNotificationKindError {}

impl NotificationKind {
    pub const ALL: [NotificationKind; 9] = [
        NotificationKind::OutreachRequest,
        NotificationKind::ReferralRequest,
        NotificationKind::ReferralApprovedReferee,
        NotificationKind::ReferralApprovedFirstDegree,
        NotificationKind::ReferralApprovedReferral,
        NotificationKind::ReferralDeniedReferee,
        NotificationKind::IntroductionRequest,
        NotificationKind::IntroductionMutual,
        NotificationKind::MagicLink,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::OutreachRequest => "outreach_request",
            NotificationKind::ReferralRequest => "referral_request",
            NotificationKind::ReferralApprovedReferee => "referral_approved_referee",
            NotificationKind::ReferralApprovedFirstDegree => "referral_approved_first_degree",
            NotificationKind::ReferralApprovedReferral => "referral_approved_referral",
            NotificationKind::ReferralDeniedReferee => "referral_denied_referee",
            NotificationKind::IntroductionRequest => "introduction_request",
            NotificationKind::IntroductionMutual => "introduction_mutual",
            NotificationKind::MagicLink => "magic_link",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = ParseNotificationKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ParseNotificationKindError(s.to_string()))
    }
}

/// Outbound channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
}

/// Append-only audit entry for one outbound communication. Only the sent
/// timestamps are ever stamped after creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub sender_id: Option<AccountId>, // None for system messages
    pub receiver_id: AccountId,
    pub kind: NotificationKind,
    pub subject: String,
    pub body: String,
    pub email_attempted: bool,
    pub sms_attempted: bool,
    pub email_sent_at: Option<DateTime<Utc>>,
    pub sms_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a notification record
#[derive(Clone, Debug)]
pub struct CreateNotificationParams {
    pub sender_id: Option<AccountId>,
    pub receiver_id: AccountId,
    pub kind: NotificationKind,
    pub subject: String,
    pub body: String,
    pub email_attempted: bool,
    pub sms_attempted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for kind in NotificationKind::ALL {
            assert_eq!(kind.as_str().parse::<NotificationKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_kind_serde_matches_as_str() {
        for kind in NotificationKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
