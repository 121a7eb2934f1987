//! Direct introductions brokered between two people.
//!
//! Each side decides once. The aggregate status is never written; it is
//! derived from the two per-side decisions every time the record is read.
//! A decline by either side freezes the introduction as declined, and the
//! mutual notification goes out only from the decision that completes
//! `both_accepted`.

use kinnect_storage::{
    Account, AccountId, AccountRole, ClaimAccountParams, CreateIntroductionParams,
    IntroductionId, IntroductionPartyParams, IntroductionSide, IntroductionStatus,
    NotificationKind, PendingIntroduction, SideDecision, Store, StoreError, Transition,
};
use tracing::{debug, info};

use crate::error::{EngineError, NotFoundAs};
use crate::identity::{lookup_existing, normalize_email, normalize_phone, resolve_by_email};
use crate::magic_link;
use crate::notify::{ChannelFlags, DeliveryReport, OutboundMessage, Recipient};
use crate::participant::Responder;
use crate::server::KinnectServer;

const SIDES: [IntroductionSide; 2] = [IntroductionSide::PersonA, IntroductionSide::PersonB];

/// Free-text description of one introduced person.
#[derive(Clone, Debug, Default)]
pub struct IntroducedPerson {
    pub name: String,
    pub email: String,
    pub company: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CreatedIntroduction {
    pub introduction: PendingIntroduction,
    pub report: DeliveryReport,
}

pub fn introduction_path(id: &IntroductionId) -> String {
    format!("/introductions/{id}")
}

fn validate(person: &IntroducedPerson, label: &str) -> Result<IntroductionPartyParams, EngineError> {
    let name = person.name.trim();
    if name.is_empty() {
        return Err(EngineError::InvalidInput(format!("{label} name is required")));
    }
    let email = normalize_email(&person.email)
        .filter(|e| e.contains('@'))
        .ok_or_else(|| EngineError::InvalidInput(format!("{label} needs a valid email")))?;
    Ok(IntroductionPartyParams {
        name: name.to_string(),
        email,
        company: person.company.clone().filter(|c| !c.trim().is_empty()),
        account_id: None,
    })
}

/// Create an introduction and ask both people to respond.
///
/// Each side is linked to the account owning its email, or to a new
/// placeholder, so every request carries a sign-in link bound to that person.
pub async fn create_introduction(
    server: &KinnectServer,
    introducer_id: &AccountId,
    person_a: &IntroducedPerson,
    person_b: &IntroducedPerson,
    note: Option<String>,
    channels: ChannelFlags,
) -> Result<CreatedIntroduction, EngineError> {
    let store = server.store.as_ref();
    let introducer = store
        .get_account(introducer_id)
        .await
        .not_found_as("account")?;

    let mut a = validate(person_a, "person A")?;
    let mut b = validate(person_b, "person B")?;
    if a.email == b.email {
        return Err(EngineError::InvalidInput(
            "cannot introduce someone to themselves".to_string(),
        ));
    }
    let account_a = resolve_by_email(store, &a.email, None, &a.name).await?;
    let account_b = resolve_by_email(store, &b.email, None, &b.name).await?;
    a.account_id = Some(account_a.id.clone());
    b.account_id = Some(account_b.id.clone());

    let intro = store
        .create_introduction(&CreateIntroductionParams {
            introducer_id: introducer.id.clone(),
            person_a: a,
            person_b: b,
            note: note.filter(|n| !n.trim().is_empty()),
        })
        .await?;
    info!(
        introduction_id = %intro.id,
        introducer_id = %introducer.id,
        person_a = %account_a.id,
        person_b = %account_b.id,
        "Introduction created"
    );

    let mut messages = Vec::with_capacity(2);
    for (side, account) in SIDES.into_iter().zip([&account_a, &account_b]) {
        let other = intro.party(side.other());
        let link = magic_link::issue(
            store,
            &server.public_base_url,
            &account.id,
            Some(&introduction_path(&intro.id)),
        )
        .await?;

        let mut message =
            OutboundMessage::new(NotificationKind::IntroductionRequest, Recipient::from(account))
                .from_sender(&introducer.id)
                .value("sender_name", introducer.name.as_str())
                .value("other_name", other.name.as_str())
                .value("action_url", link.url.as_str())
                .with_channels(channels);
        message.values.set_opt("other_company", other.company.as_deref());
        message.values.set_opt("note", intro.note.as_deref());
        messages.push(message);
    }

    let report = server.notifier.notify(messages).await;
    Ok(CreatedIntroduction {
        introduction: intro,
        report,
    })
}

/// Read an introduction, first linking any side whose email now belongs to
/// an account.
pub async fn get_introduction(
    server: &KinnectServer,
    id: &IntroductionId,
) -> Result<PendingIntroduction, EngineError> {
    let store = server.store.as_ref();
    let intro = store
        .get_introduction(id)
        .await
        .not_found_as("introduction")?;

    let mut changed = false;
    for side in SIDES {
        let party = intro.party(side);
        if party.account_id.is_some() {
            continue;
        }
        if let Some(account) = lookup_existing(store, Some(&party.email), None).await? {
            if store.link_introduction_party(id, side, &account.id).await? {
                info!(
                    introduction_id = %id,
                    side = side.as_str(),
                    account_id = %account.id,
                    "Backfilled introduction party"
                );
                changed = true;
            }
        }
    }

    if changed {
        Ok(store.get_introduction(id).await.not_found_as("introduction")?)
    } else {
        Ok(intro)
    }
}

pub async fn list_introductions(
    server: &KinnectServer,
    introducer_id: &AccountId,
) -> Result<Vec<PendingIntroduction>, EngineError> {
    Ok(server
        .store
        .list_introductions_by_introducer(introducer_id)
        .await?)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntroductionDecision {
    Accept,
    Decline,
}

impl IntroductionDecision {
    fn side_decision(self) -> SideDecision {
        match self {
            IntroductionDecision::Accept => SideDecision::Accepted,
            IntroductionDecision::Decline => SideDecision::Declined,
        }
    }
}

/// Details an unregistered responder may leave so an account can be made
/// for them.
#[derive(Clone, Debug, Default)]
pub struct ContactDetails {
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntroductionOutcome {
    /// Decision stored. Carries a delivery report when it completed a mutual
    /// acceptance.
    Recorded(PendingIntroduction, Option<DeliveryReport>),
    AlreadyResponded(IntroductionStatus),
    NotParticipant,
}

/// Record one side's decision.
pub async fn respond_to_introduction(
    server: &KinnectServer,
    id: &IntroductionId,
    responder: &Responder,
    decision: IntroductionDecision,
    details: Option<ContactDetails>,
) -> Result<IntroductionOutcome, EngineError> {
    let store = server.store.as_ref();
    let intro = get_introduction(server, id).await?;

    let Some(side) = responder.side_in(&intro) else {
        debug!(introduction_id = %id, "Introduction decision from non-participant");
        return Ok(IntroductionOutcome::NotParticipant);
    };
    let party = intro.party(side);
    if party.decision != SideDecision::Undecided || intro.status() == IntroductionStatus::Declined
    {
        return Ok(IntroductionOutcome::AlreadyResponded(intro.status()));
    }

    // The slot is keyed by its stored email. Responder details only fill in
    // a placeholder, they never choose the account.
    let details = details.unwrap_or_default();
    match &party.account_id {
        Some(account_id) => apply_details(store, account_id, &details).await?,
        None => {
            let name = details.name.as_deref().unwrap_or(&party.name);
            let account =
                resolve_by_email(store, &party.email, details.phone.as_deref(), name).await?;
            store.link_introduction_party(id, side, &account.id).await?;
        }
    }

    let updated = match store
        .record_introduction_decision(id, side, decision.side_decision())
        .await?
    {
        Transition::Applied(updated) => updated,
        Transition::Unchanged(current) => {
            info!(introduction_id = %id, status = %current.status(), "Introduction decision not applied");
            return Ok(IntroductionOutcome::AlreadyResponded(current.status()));
        }
    };
    info!(
        introduction_id = %id,
        side = side.as_str(),
        decision = decision.side_decision().as_str(),
        status = %updated.status(),
        "Introduction decision recorded"
    );

    let report = if updated.status() == IntroductionStatus::BothAccepted {
        Some(notify_mutual(server, &updated).await?)
    } else {
        None
    };

    Ok(IntroductionOutcome::Recorded(updated, report))
}

/// Store a responder's name and phone on their placeholder account. Skipped
/// once the account is registered, or when the phone belongs to someone else.
async fn apply_details(
    store: &dyn Store,
    account_id: &AccountId,
    details: &ContactDetails,
) -> Result<(), EngineError> {
    let name = details.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let phone = details.phone.as_deref().and_then(normalize_phone);
    if name.is_none() && phone.is_none() {
        return Ok(());
    }
    let account = store.get_account(account_id).await.not_found_as("account")?;
    if account.role != AccountRole::Unregistered {
        return Ok(());
    }

    let params = ClaimAccountParams {
        name: name.unwrap_or(&account.name).to_string(),
        email: None,
        phone,
        handle: account.handle.clone(),
        role: AccountRole::Unregistered,
    };
    match store.claim_account(account_id, &params).await {
        Ok(_) => {
            debug!(account_id = %account_id, "Responder details stored");
            Ok(())
        }
        Err(StoreError::AlreadyExists) => {
            debug!(account_id = %account_id, "Responder phone already taken, details not stored");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Tell each side how to reach the other.
async fn notify_mutual(
    server: &KinnectServer,
    intro: &PendingIntroduction,
) -> Result<DeliveryReport, EngineError> {
    let store = server.store.as_ref();
    let introducer = store
        .get_account(&intro.introducer_id)
        .await
        .not_found_as("account")?;

    let mut messages = Vec::with_capacity(2);
    for side in SIDES {
        let party = intro.party(side);
        let other = intro.party(side.other());

        let recipient =
            party_recipient(server, party.account_id.as_ref(), &party.name, &party.email).await?;
        let other_contact = match &other.account_id {
            Some(id) => store
                .get_account(id)
                .await
                .not_found_as("account")?
                .contact_channel()
                .map(str::to_string)
                .unwrap_or_else(|| other.email.clone()),
            None => other.email.clone(),
        };

        messages.push(
            OutboundMessage::new(NotificationKind::IntroductionMutual, recipient)
                .from_sender(&introducer.id)
                .value("sender_name", introducer.name.as_str())
                .value("other_name", other.name.as_str())
                .value("other_contact", other_contact),
        );
    }

    Ok(server.notifier.notify(messages).await)
}

async fn party_recipient(
    server: &KinnectServer,
    account_id: Option<&AccountId>,
    name: &str,
    email: &str,
) -> Result<Recipient, EngineError> {
    match account_id {
        Some(id) => {
            let account: Account = server.store.get_account(id).await.not_found_as("account")?;
            Ok(Recipient::from(&account))
        }
        None => Ok(Recipient {
            account_id: None,
            name: name.to_string(),
            email: Some(email.to_string()),
            phone: None,
        }),
    }
}
