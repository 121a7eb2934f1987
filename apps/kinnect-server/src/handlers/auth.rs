//! Passwordless sign-in via magic links.

use kinnect_storage::{Account, NotificationKind, StoreError};
use tracing::debug;

use crate::error::EngineError;
use crate::identity::lookup_existing;
use crate::magic_link::{self, Redemption, MAGIC_LINK_TTL_MINUTES};
use crate::notify::{DeliveryReport, OutboundMessage};
use crate::server::KinnectServer;

/// Send a sign-in link to whoever owns `email`.
///
/// Returns `None` when no account owns the address; callers should respond
/// the same way in both cases.
pub async fn request_sign_in(
    server: &KinnectServer,
    email: &str,
    redirect: Option<&str>,
) -> Result<Option<DeliveryReport>, EngineError> {
    let Some(account) = lookup_existing(server.store.as_ref(), Some(email), None).await? else {
        debug!("Sign-in requested for unknown address");
        return Ok(None);
    };

    let link = magic_link::issue(
        server.store.as_ref(),
        &server.public_base_url,
        &account.id,
        redirect,
    )
    .await?;

    let message = OutboundMessage::new(NotificationKind::MagicLink, &account)
        .value("action_url", link.url.as_str())
        .value("expires_minutes", MAGIC_LINK_TTL_MINUTES.to_string());

    Ok(Some(server.notifier.notify_one(message).await))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignInOutcome {
    SignedIn {
        account: Account,
        redirect_path: Option<String>,
    },
    Invalid,
}

/// Redeem a link and load the account it was bound to.
pub async fn sign_in(server: &KinnectServer, token: &str) -> Result<SignInOutcome, EngineError> {
    match magic_link::redeem(server.store.as_ref(), token).await? {
        Redemption::Valid {
            account_id,
            redirect_path,
        } => match server.store.get_account(&account_id).await {
            Ok(account) => Ok(SignInOutcome::SignedIn {
                account,
                redirect_path,
            }),
            Err(StoreError::NotFound) => Ok(SignInOutcome::Invalid),
            Err(e) => Err(e.into()),
        },
        Redemption::Invalid => Ok(SignInOutcome::Invalid),
    }
}
