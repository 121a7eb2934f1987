//! Account registration and lookup.

use kinnect_storage::{
    Account, AccountId, AccountRole, ClaimAccountParams, CreateAccountParams, StoreError,
    Transition,
};
use tracing::info;

use crate::error::{EngineError, NotFoundAs};
use crate::identity::{self, normalize_email, normalize_phone};
use crate::server::KinnectServer;

#[derive(Clone, Debug)]
pub struct Registration {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub handle: Option<String>,
    pub role: AccountRole,
}

/// Create an account and link every contact book entry that already knows
/// one of its channels.
///
/// A placeholder made earlier for one of the channels is taken over rather
/// than rejected, so referrals and introductions that already point at it
/// stay attached.
pub async fn register_account(
    server: &KinnectServer,
    registration: Registration,
) -> Result<Account, EngineError> {
    let store = server.store.as_ref();
    let name = registration.name.trim();
    if name.is_empty() {
        return Err(EngineError::InvalidInput("name is required".to_string()));
    }
    let email = registration.email.as_deref().and_then(normalize_email);
    let phone = registration.phone.as_deref().and_then(normalize_phone);
    let handle = registration.handle.filter(|h| !h.trim().is_empty());

    let by_email = identity::lookup_existing(store, email.as_deref(), None).await?;
    let by_phone = identity::lookup_existing(store, None, phone.as_deref()).await?;
    let existing = match (by_email, by_phone) {
        (Some(a), Some(b)) if a.id != b.id => return Err(channel_taken()),
        (a, b) => a.or(b),
    };

    let account = match existing {
        Some(existing) if existing.role == AccountRole::Unregistered => {
            let claimed = store
                .claim_account(
                    &existing.id,
                    &ClaimAccountParams {
                        name: name.to_string(),
                        email,
                        phone,
                        handle,
                        role: registration.role,
                    },
                )
                .await
                .map_err(taken_as_invalid)?;
            match claimed {
                Transition::Applied(account) => {
                    info!(account_id = %account.id, role = account.role.as_str(), "Placeholder account registered");
                    account
                }
                Transition::Unchanged(_) => return Err(channel_taken()),
            }
        }
        Some(_) => return Err(channel_taken()),
        None => {
            let account = store
                .create_account(&CreateAccountParams {
                    name: name.to_string(),
                    email,
                    phone,
                    handle,
                    role: registration.role,
                })
                .await
                .map_err(taken_as_invalid)?;
            info!(account_id = %account.id, role = account.role.as_str(), "Account registered");
            account
        }
    };

    identity::link(store, &account).await?;
    Ok(account)
}

fn channel_taken() -> EngineError {
    EngineError::InvalidInput("an account with this email or phone already exists".to_string())
}

fn taken_as_invalid(e: StoreError) -> EngineError {
    match e {
        StoreError::AlreadyExists => channel_taken(),
        other => other.into(),
    }
}

/// Look an account up by id, or by email when the key is not an id.
pub async fn find_account(server: &KinnectServer, key: &str) -> Result<Account, EngineError> {
    match key.parse::<AccountId>() {
        Ok(id) => server.store.get_account(&id).await.not_found_as("account"),
        Err(_) => identity::lookup_existing(server.store.as_ref(), Some(key), Some(key))
            .await?
            .ok_or(EngineError::NotFound("account")),
    }
}
