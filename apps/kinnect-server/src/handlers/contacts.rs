//! Contact book.

use kinnect_storage::{AccountId, ContactBookEntry, CreateContactParams, StoreError};
use tracing::info;

use crate::error::{EngineError, NotFoundAs};
use crate::identity::{lookup_existing, normalize_email, normalize_phone};
use crate::server::KinnectServer;

#[derive(Clone, Debug, Default)]
pub struct NewContact {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub organization: Option<String>,
}

/// Add a person to `owner_id`'s contact book, linking it straight away if an
/// account already owns one of its channels.
pub async fn add_contact(
    server: &KinnectServer,
    owner_id: &AccountId,
    contact: NewContact,
) -> Result<ContactBookEntry, EngineError> {
    let name = contact.name.trim();
    if name.is_empty() {
        return Err(EngineError::InvalidInput("name is required".to_string()));
    }
    server
        .store
        .get_account(owner_id)
        .await
        .not_found_as("account")?;

    let email = contact.email.as_deref().and_then(normalize_email);
    let phone = contact.phone.as_deref().and_then(normalize_phone);
    let linked = lookup_existing(server.store.as_ref(), email.as_deref(), phone.as_deref())
        .await?
        .map(|a| a.id);

    let entry = server
        .store
        .create_contact_entry(&CreateContactParams {
            owner_id: owner_id.clone(),
            linked_account_id: linked,
            name: name.to_string(),
            email,
            phone,
            organization: contact.organization.filter(|o| !o.trim().is_empty()),
        })
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists => EngineError::InvalidInput(
                "a contact with this email is already in the contact book".to_string(),
            ),
            other => other.into(),
        })?;

    info!(
        owner_id = %owner_id,
        entry_id = %entry.id,
        linked = entry.linked_account_id.is_some(),
        "Contact added"
    );
    Ok(entry)
}

pub async fn list_contacts(
    server: &KinnectServer,
    owner_id: &AccountId,
) -> Result<Vec<ContactBookEntry>, EngineError> {
    server
        .store
        .get_account(owner_id)
        .await
        .not_found_as("account")?;
    Ok(server.store.list_contact_entries(owner_id).await?)
}
