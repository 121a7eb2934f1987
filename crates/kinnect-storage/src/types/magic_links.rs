//! Magic link token types.

use chrono::{DateTime, Utc};

use super::AccountId;

/// Stored magic link. Only the SHA-256 of the token value is persisted; at most
/// one row exists per account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MagicLinkToken {
    pub account_id: AccountId,
    pub token_hash: String, // hex(SHA-256(token))
    pub redirect_path: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for issuing (upserting) a magic link
#[derive(Clone, Debug)]
pub struct UpsertMagicLinkParams {
    pub account_id: AccountId,
    pub token_hash: String,
    pub redirect_path: Option<String>,
    pub expires_at: DateTime<Utc>,
}
