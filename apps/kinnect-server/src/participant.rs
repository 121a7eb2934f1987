//! Who a consent slot refers to, and who is acting on it.
//!
//! Both consent machines identify the acting person the same way: by account
//! id when the slot is linked, otherwise by (case-insensitive) email.

use kinnect_storage::{AccountId, IntroductionParty, IntroductionSide, PendingIntroduction};

/// A stored party slot, resolved as far as it currently can be.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Participant {
    Known(AccountId),
    EmailOnly(String),
}

impl Participant {
    pub fn from_party(party: &IntroductionParty) -> Self {
        match &party.account_id {
            Some(id) => Participant::Known(id.clone()),
            None => Participant::EmailOnly(party.email.clone()),
        }
    }
}

/// The person submitting a decision.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Responder {
    pub account_id: Option<AccountId>,
    pub email: Option<String>,
}

impl Responder {
    pub fn account(id: AccountId) -> Self {
        Self {
            account_id: Some(id),
            email: None,
        }
    }

    pub fn email(email: impl Into<String>) -> Self {
        Self {
            account_id: None,
            email: Some(email.into()),
        }
    }

    /// Id match first, then email match.
    pub fn matches(&self, slot_account: Option<&AccountId>, slot_email: Option<&str>) -> bool {
        self.matches_id(slot_account) || self.matches_email(slot_email)
    }

    fn matches_id(&self, slot_account: Option<&AccountId>) -> bool {
        matches!((&self.account_id, slot_account), (Some(mine), Some(theirs)) if mine == theirs)
    }

    fn matches_email(&self, slot_email: Option<&str>) -> bool {
        match (&self.email, slot_email) {
            (Some(mine), Some(theirs)) => mine.trim().eq_ignore_ascii_case(theirs.trim()),
            _ => false,
        }
    }

    /// Which side of an introduction this responder is, if any. An id match
    /// on either side wins over an email match on the other.
    pub fn side_in(&self, intro: &PendingIntroduction) -> Option<IntroductionSide> {
        const SIDES: [IntroductionSide; 2] = [IntroductionSide::PersonA, IntroductionSide::PersonB];
        SIDES
            .into_iter()
            .find(|side| self.matches_id(intro.party(*side).account_id.as_ref()))
            .or_else(|| {
                SIDES
                    .into_iter()
                    .find(|side| self.matches_email(Some(&intro.party(*side).email)))
            })
    }
}
