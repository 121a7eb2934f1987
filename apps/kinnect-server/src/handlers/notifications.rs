use kinnect_storage::{AccountId, NotificationRecord};

use crate::error::{EngineError, NotFoundAs};
use crate::server::KinnectServer;

/// An account's received notifications, newest first.
pub async fn list_notifications(
    server: &KinnectServer,
    account_id: &AccountId,
) -> Result<Vec<NotificationRecord>, EngineError> {
    server
        .store
        .get_account(account_id)
        .await
        .not_found_as("account")?;
    Ok(server.store.list_notifications(account_id).await?)
}
