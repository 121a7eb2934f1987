//! The Store trait that backends implement.

use chrono::{DateTime, Utc};

use crate::types::*;
use crate::{StoreError, Transition};

/// The storage trait the workflow engine depends on.
///
/// Every state-machine write is a single conditional update: the backend
/// checks the guard and writes in one atomic statement, returning the row as
/// that statement left it. Emails are expected lowercased by the caller.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // ───────────────────────────────────── Accounts ───────────────────────────────────────

    /// Create an account. Returns `AlreadyExists` if the email or phone is taken.
    async fn create_account(&self, params: &CreateAccountParams) -> Result<Account, StoreError>;

    /// Get account by ID.
    async fn get_account(&self, account_id: &AccountId) -> Result<Account, StoreError>;

    /// Get account by (lowercased) email.
    async fn get_account_by_email(&self, email: &str) -> Result<Account, StoreError>;

    /// Get account by phone.
    async fn get_account_by_phone(&self, phone: &str) -> Result<Account, StoreError>;

    /// Fill in an account that is still `unregistered`. Guarded on the role,
    /// so a registered account is returned `Unchanged`. Returns
    /// `AlreadyExists` if a new channel belongs to another account.
    async fn claim_account(
        &self,
        account_id: &AccountId,
        params: &ClaimAccountParams,
    ) -> Result<Transition<Account>, StoreError>;

    // ───────────────────────────────────── Contact Book ───────────────────────────────────

    /// Create a contact book entry. Returns `AlreadyExists` on a duplicate
    /// (owner, email) pair.
    async fn create_contact_entry(
        &self,
        params: &CreateContactParams,
    ) -> Result<ContactBookEntry, StoreError>;

    /// Get contact book entry by ID.
    async fn get_contact_entry(&self, id: &ContactEntryId) -> Result<ContactBookEntry, StoreError>;

    /// List all contact book entries owned by an account.
    async fn list_contact_entries(
        &self,
        owner_id: &AccountId,
    ) -> Result<Vec<ContactBookEntry>, StoreError>;

    /// Link every still-unlinked entry whose email or phone matches the
    /// account's. Returns the number of entries that changed.
    async fn link_contact_entries(&self, account: &Account) -> Result<u64, StoreError>;

    /// Stamp when an outreach request was last sent to this contact.
    async fn mark_contact_requested(
        &self,
        id: &ContactEntryId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    // ───────────────────────────────────── Referrals ──────────────────────────────────────

    /// Create a pending referral record.
    async fn create_referral(
        &self,
        params: &CreateReferralParams,
    ) -> Result<ReferralRecord, StoreError>;

    /// Get referral record by ID.
    async fn get_referral(&self, id: &ReferralId) -> Result<ReferralRecord, StoreError>;

    /// List referral records in a given status.
    async fn list_referrals_by_status(
        &self,
        status: ReferralStatus,
    ) -> Result<Vec<ReferralRecord>, StoreError>;

    /// Move a pending referral to a terminal status.
    ///
    /// `Unchanged` if the record was no longer pending.
    async fn decide_referral(
        &self,
        id: &ReferralId,
        status: ReferralStatus,
        at: DateTime<Utc>,
    ) -> Result<Transition<ReferralRecord>, StoreError>;

    // ───────────────────────────────────── Introductions ──────────────────────────────────

    /// Create an introduction with both sides undecided.
    async fn create_introduction(
        &self,
        params: &CreateIntroductionParams,
    ) -> Result<PendingIntroduction, StoreError>;

    /// Get introduction by ID.
    async fn get_introduction(&self, id: &IntroductionId)
        -> Result<PendingIntroduction, StoreError>;

    /// List introductions made by an introducer.
    async fn list_introductions_by_introducer(
        &self,
        introducer_id: &AccountId,
    ) -> Result<Vec<PendingIntroduction>, StoreError>;

    /// Fill a side's account link if it is still empty. Returns whether it changed.
    async fn link_introduction_party(
        &self,
        id: &IntroductionId,
        side: IntroductionSide,
        account_id: &AccountId,
    ) -> Result<bool, StoreError>;

    /// Record one side's decision.
    ///
    /// Applied only if that side is still undecided and the other side has
    /// not declined; otherwise `Unchanged` with the current row.
    async fn record_introduction_decision(
        &self,
        id: &IntroductionId,
        side: IntroductionSide,
        decision: SideDecision,
    ) -> Result<Transition<PendingIntroduction>, StoreError>;

    // ───────────────────────────────────── Notifications ──────────────────────────────────

    /// Append a notification record.
    async fn create_notification(
        &self,
        params: &CreateNotificationParams,
    ) -> Result<NotificationRecord, StoreError>;

    /// Stamp a channel's successful send time.
    async fn mark_notification_sent(
        &self,
        id: &NotificationId,
        channel: Channel,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// List notifications received by an account, newest first.
    async fn list_notifications(
        &self,
        receiver_id: &AccountId,
    ) -> Result<Vec<NotificationRecord>, StoreError>;

    // ───────────────────────────────────── Magic Links ────────────────────────────────────

    /// Insert or overwrite the account's single magic link.
    async fn upsert_magic_link(&self, params: &UpsertMagicLinkParams) -> Result<(), StoreError>;

    /// Atomically remove and return the magic link with this hash.
    /// `NotFound` if no such token exists (never issued or already consumed).
    async fn take_magic_link(&self, token_hash: &str) -> Result<MagicLinkToken, StoreError>;
}
