//! Identity resolution: map a contact channel to an account, creating a
//! placeholder account when nobody owns it yet, and keep contact book entries
//! linked to the accounts their channels belong to.
//!
//! Resolution is keyed purely by channel (email first, then phone), never by
//! who is asking. When a stored account and a new reference disagree on
//! details such as the name, the stored account wins.

use kinnect_storage::{Account, AccountRole, CreateAccountParams, Store, StoreError};
use tracing::{debug, info};

use crate::error::EngineError;

pub fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim().to_lowercase();
    (!email.is_empty()).then_some(email)
}

pub fn normalize_phone(phone: &str) -> Option<String> {
    let phone = phone.trim();
    (!phone.is_empty()).then(|| phone.to_string())
}

/// Find the account owning `email`, else the one owning `phone`.
pub async fn lookup_existing(
    store: &dyn Store,
    email: Option<&str>,
    phone: Option<&str>,
) -> Result<Option<Account>, StoreError> {
    if let Some(email) = email.and_then(normalize_email) {
        match store.get_account_by_email(&email).await {
            Ok(account) => return Ok(Some(account)),
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(e),
        }
    }
    if let Some(phone) = phone.and_then(normalize_phone) {
        match store.get_account_by_phone(&phone).await {
            Ok(account) => return Ok(Some(account)),
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}

/// Resolve a channel to an account, creating an `unregistered` placeholder if
/// none exists, then link any contact book entries that carry its channels.
///
/// Idempotent: the same email always yields the same account.
pub async fn resolve_or_create(
    store: &dyn Store,
    email: Option<&str>,
    phone: Option<&str>,
    name: &str,
) -> Result<Account, EngineError> {
    let email = email.and_then(normalize_email);
    let phone = phone.and_then(normalize_phone);
    if email.is_none() && phone.is_none() {
        return Err(EngineError::InvalidInput(
            "an email or phone number is required".to_string(),
        ));
    }

    let account = match lookup_existing(store, email.as_deref(), phone.as_deref()).await? {
        Some(existing) => existing,
        None => create_placeholder(store, email, phone, name).await?,
    };

    link(store, &account).await?;
    Ok(account)
}

/// Resolve a slot that is keyed by `email` alone.
///
/// The phone is only stored on a newly created placeholder, and only when no
/// other account owns it. It never decides which account the email maps to.
pub async fn resolve_by_email(
    store: &dyn Store,
    email: &str,
    phone: Option<&str>,
    name: &str,
) -> Result<Account, EngineError> {
    let email = normalize_email(email)
        .ok_or_else(|| EngineError::InvalidInput("an email is required".to_string()))?;
    if let Some(account) = lookup_existing(store, Some(&email), None).await? {
        link(store, &account).await?;
        return Ok(account);
    }

    let mut phone = phone.and_then(normalize_phone);
    if let Some(owner) = lookup_existing(store, None, phone.as_deref()).await? {
        debug!(account_id = %owner.id, "Phone already owned by another account, not stored");
        phone = None;
    }
    resolve_or_create(store, Some(&email), phone.as_deref(), name).await
}

async fn create_placeholder(
    store: &dyn Store,
    email: Option<String>,
    phone: Option<String>,
    name: &str,
) -> Result<Account, EngineError> {
    let name = match name.trim() {
        "" => email.clone().or_else(|| phone.clone()).unwrap_or_default(),
        n => n.to_string(),
    };
    let params = CreateAccountParams {
        name,
        email: email.clone(),
        phone: phone.clone(),
        handle: None,
        role: AccountRole::Unregistered,
    };

    match store.create_account(&params).await {
        Ok(account) => {
            info!(account_id = %account.id, "Created placeholder account");
            Ok(account)
        }
        // Someone else created it between our lookup and insert.
        Err(StoreError::AlreadyExists) => {
            lookup_existing(store, email.as_deref(), phone.as_deref())
                .await?
                .ok_or(EngineError::Store(StoreError::AlreadyExists))
        }
        Err(e) => Err(e.into()),
    }
}

/// Link still-unlinked contact book entries whose channels match `account`.
pub async fn link(store: &dyn Store, account: &Account) -> Result<u64, StoreError> {
    let linked = store.link_contact_entries(account).await?;
    if linked > 0 {
        info!(account_id = %account.id, linked, "Linked contact book entries");
    } else {
        debug!(account_id = %account.id, "No contact book entries to link");
    }
    Ok(linked)
}
