//! The referee → first-degree → referral consent chain.
//!
//! A referral record starts `pending` and is moved to `approved` or `denied`
//! exactly once, by the referral target. The move is a single conditional
//! update in the store, so of two racing decisions only one is applied and
//! the other sees the record as already decided.

use chrono::Utc;
use kinnect_storage::{
    Account, AccountId, CreateReferralParams, NotificationKind, ReferralId, ReferralRecord,
    ReferralStatus, Transition,
};
use kinnect_template::build_statement;
use tracing::{debug, info};

use super::DispatchOptions;
use crate::error::{EngineError, NotFoundAs};
use crate::identity::resolve_or_create;
use crate::magic_link;
use crate::notify::{DeliveryReport, OutboundMessage};
use crate::participant::Responder;
use crate::server::KinnectServer;

/// Someone the first-degree contact is putting forward.
#[derive(Clone, Debug, Default)]
pub struct ReferralTarget {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SubmittedReferrals {
    pub referrals: Vec<ReferralRecord>,
    pub report: DeliveryReport,
}

pub fn respond_path(referral_id: &ReferralId) -> String {
    format!("/referrals/{referral_id}/respond")
}

/// Create one pending referral per target and ask each target to respond.
pub async fn submit_referrals(
    server: &KinnectServer,
    referee_id: &AccountId,
    first_degree_id: &AccountId,
    targets: &[ReferralTarget],
    options: &DispatchOptions,
) -> Result<SubmittedReferrals, EngineError> {
    if targets.is_empty() {
        return Err(EngineError::InvalidInput(
            "at least one referral target is required".to_string(),
        ));
    }
    let store = server.store.as_ref();
    let referee = store.get_account(referee_id).await.not_found_as("referee")?;
    let first_degree = store
        .get_account(first_degree_id)
        .await
        .not_found_as("first-degree contact")?;

    // Resolve every target before creating anything so a bad target leaves
    // no partial batch behind.
    let mut resolved: Vec<Account> = Vec::with_capacity(targets.len());
    for target in targets {
        let account = resolve_or_create(
            store,
            Some(&target.email),
            target.phone.as_deref(),
            &target.name,
        )
        .await?;
        if account.id == referee.id || account.id == first_degree.id {
            return Err(EngineError::InvalidInput(format!(
                "{} cannot be referred in their own referral",
                target.email
            )));
        }
        // One record per person, or a later link would replace the first.
        if resolved.iter().any(|r| r.id == account.id) {
            debug!(target_id = %account.id, "Duplicate referral target skipped");
            continue;
        }
        resolved.push(account);
    }

    let statement = build_statement(&options.statement);
    let mut referrals = Vec::with_capacity(resolved.len());
    let mut messages = Vec::with_capacity(resolved.len());

    for target in &resolved {
        let record = store
            .create_referral(&CreateReferralParams {
                referee_id: referee.id.clone(),
                first_degree_id: first_degree.id.clone(),
                referral_id: target.id.clone(),
            })
            .await?;

        let link = magic_link::issue(
            store,
            &server.public_base_url,
            &target.id,
            Some(&respond_path(&record.id)),
        )
        .await?;

        let mut message = OutboundMessage::new(NotificationKind::ReferralRequest, target)
            .from_sender(&first_degree.id)
            .value("sender_name", first_degree.name.as_str())
            .value("referee_name", referee.name.as_str())
            .value("statement", statement.as_str())
            .value("action_url", link.url.as_str())
            .with_override(options.template_override.as_ref())
            .with_channels(options.channels);
        message.values.set_opt("message", options.message.as_deref());
        messages.push(message);

        info!(
            referral_id = %record.id,
            referee_id = %referee.id,
            first_degree_id = %first_degree.id,
            target_id = %target.id,
            "Referral created"
        );
        referrals.push(record);
    }

    let report = server.notifier.notify(messages).await;
    Ok(SubmittedReferrals { referrals, report })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReferralDecision {
    Approve,
    Deny,
}

impl ReferralDecision {
    fn status(self) -> ReferralStatus {
        match self {
            ReferralDecision::Approve => ReferralStatus::Approved,
            ReferralDecision::Deny => ReferralStatus::Denied,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReferralOutcome {
    Decided(ReferralRecord, DeliveryReport),
    AlreadyResponded(ReferralStatus),
    NotParticipant,
}

/// Record the referral target's decision and notify the chain.
pub async fn respond_to_referral(
    server: &KinnectServer,
    referral_id: &ReferralId,
    responder: &Responder,
    decision: ReferralDecision,
) -> Result<ReferralOutcome, EngineError> {
    let store = server.store.as_ref();
    let record = store
        .get_referral(referral_id)
        .await
        .not_found_as("referral")?;
    let target = store
        .get_account(&record.referral_id)
        .await
        .not_found_as("account")?;

    if !responder.matches(Some(&target.id), target.email.as_deref()) {
        debug!(referral_id = %referral_id, "Referral decision from non-participant");
        return Ok(ReferralOutcome::NotParticipant);
    }
    if record.status.is_terminal() {
        return Ok(ReferralOutcome::AlreadyResponded(record.status));
    }

    let decided = match store
        .decide_referral(referral_id, decision.status(), Utc::now())
        .await?
    {
        Transition::Applied(decided) => decided,
        Transition::Unchanged(current) => {
            info!(referral_id = %referral_id, status = current.status.as_str(), "Referral already decided");
            return Ok(ReferralOutcome::AlreadyResponded(current.status));
        }
    };
    info!(referral_id = %referral_id, status = decided.status.as_str(), "Referral decided");

    let referee = store
        .get_account(&decided.referee_id)
        .await
        .not_found_as("account")?;
    let first_degree = store
        .get_account(&decided.first_degree_id)
        .await
        .not_found_as("account")?;

    let messages = match decided.status {
        ReferralStatus::Approved => approval_messages(&referee, &first_degree, &target),
        _ => vec![denial_message(&referee, &first_degree)],
    };
    let report = server.notifier.notify(messages).await;

    Ok(ReferralOutcome::Decided(decided, report))
}

/// Approval discloses each end's contact to the other. The intermediary
/// gets a thank-you with no contact details.
fn approval_messages(
    referee: &Account,
    first_degree: &Account,
    target: &Account,
) -> Vec<OutboundMessage> {
    vec![
        OutboundMessage::new(NotificationKind::ReferralApprovedReferee, referee)
            .from_sender(&target.id)
            .value("sender_name", target.name.as_str())
            .value("referral_name", target.name.as_str())
            .value("referral_contact", target.contact_channel().unwrap_or_default())
            .value("first_degree_name", first_degree.name.as_str()),
        OutboundMessage::new(NotificationKind::ReferralApprovedFirstDegree, first_degree)
            .from_sender(&target.id)
            .value("sender_name", target.name.as_str())
            .value("referee_name", referee.name.as_str())
            .value("referral_name", target.name.as_str()),
        OutboundMessage::new(NotificationKind::ReferralApprovedReferral, target)
            .from_sender(&referee.id)
            .value("sender_name", referee.name.as_str())
            .value("referee_name", referee.name.as_str())
            .value("referee_contact", referee.contact_channel().unwrap_or_default()),
    ]
}

/// Denial tells only the referee, as a system message that discloses nothing
/// about the target.
fn denial_message(referee: &Account, first_degree: &Account) -> OutboundMessage {
    OutboundMessage::new(NotificationKind::ReferralDeniedReferee, referee)
        .value("sender_name", first_degree.name.as_str())
        .value("first_degree_name", first_degree.name.as_str())
}

pub async fn list_referrals(
    server: &KinnectServer,
    status: ReferralStatus,
) -> Result<Vec<ReferralRecord>, EngineError> {
    Ok(server.store.list_referrals_by_status(status).await?)
}
