//! Contact book types.

use chrono::{DateTime, Utc};

use super::{AccountId, ContactEntryId};

/// One account's record of a person they know.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContactBookEntry {
    pub id: ContactEntryId,
    pub owner_id: AccountId,
    pub linked_account_id: Option<AccountId>, // Weak reference, resolved lazily
    pub name: String,
    pub email: Option<String>, // Unique per owner when present
    pub phone: Option<String>,
    pub organization: Option<String>,
    pub last_requested_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a contact book entry
#[derive(Clone, Debug)]
pub struct CreateContactParams {
    pub owner_id: AccountId,
    pub linked_account_id: Option<AccountId>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub organization: Option<String>,
}
