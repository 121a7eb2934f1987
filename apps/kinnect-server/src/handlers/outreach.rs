//! Referee outreach: asking first-degree contacts to make introductions.

use chrono::Utc;
use kinnect_storage::{AccountId, ContactEntryId, NotificationKind, StoreError};
use kinnect_template::build_statement;
use tracing::{info, warn};

use super::DispatchOptions;
use crate::error::{EngineError, NotFoundAs};
use crate::identity::resolve_or_create;
use crate::magic_link;
use crate::notify::{DeliveryReport, OutboundMessage};
use crate::server::KinnectServer;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    NotFound,
    NotOwned,
    NoContactChannel,
}

#[derive(Clone, Debug, Default)]
pub struct OutreachResult {
    /// Contact entry and the account it resolved to.
    pub requested: Vec<(ContactEntryId, AccountId)>,
    pub skipped: Vec<(ContactEntryId, SkipReason)>,
    pub report: DeliveryReport,
}

/// Where a first-degree contact lands after following an outreach link.
pub fn referral_form_path(referee_id: &AccountId) -> String {
    format!("/referrals/new?referee={referee_id}")
}

/// Send an outreach request to each of the referee's listed contacts.
pub async fn request_introductions(
    server: &KinnectServer,
    referee_id: &AccountId,
    contact_entry_ids: &[ContactEntryId],
    options: &DispatchOptions,
) -> Result<OutreachResult, EngineError> {
    let store = server.store.as_ref();
    let referee = store.get_account(referee_id).await.not_found_as("account")?;
    let statement = build_statement(&options.statement);
    let redirect = referral_form_path(&referee.id);

    let mut result = OutreachResult::default();
    let mut messages = Vec::new();

    for entry_id in contact_entry_ids {
        let entry = match store.get_contact_entry(entry_id).await {
            Ok(entry) => entry,
            Err(StoreError::NotFound) => {
                result.skipped.push((entry_id.clone(), SkipReason::NotFound));
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if entry.owner_id != referee.id {
            warn!(entry_id = %entry_id, referee_id = %referee.id, "Outreach for contact not owned by referee");
            result.skipped.push((entry_id.clone(), SkipReason::NotOwned));
            continue;
        }
        if entry.email.is_none() && entry.phone.is_none() {
            result
                .skipped
                .push((entry_id.clone(), SkipReason::NoContactChannel));
            continue;
        }

        let first_degree = resolve_or_create(
            store,
            entry.email.as_deref(),
            entry.phone.as_deref(),
            &entry.name,
        )
        .await?;
        store.mark_contact_requested(&entry.id, Utc::now()).await?;

        let link = magic_link::issue(
            store,
            &server.public_base_url,
            &first_degree.id,
            Some(&redirect),
        )
        .await?;

        let mut message = OutboundMessage::new(NotificationKind::OutreachRequest, &first_degree)
            .from_sender(&referee.id)
            .value("sender_name", referee.name.as_str())
            .value("statement", statement.as_str())
            .value("action_url", link.url.as_str())
            .with_override(options.template_override.as_ref())
            .with_channels(options.channels);
        message.values.set_opt("message", options.message.as_deref());
        messages.push(message);

        result.requested.push((entry.id, first_degree.id));
    }

    result.report = server.notifier.notify(messages).await;

    info!(
        referee_id = %referee.id,
        requested = result.requested.len(),
        skipped = result.skipped.len(),
        delivery_failed = result.report.any_failed(),
        "Outreach requests dispatched"
    );
    Ok(result)
}
