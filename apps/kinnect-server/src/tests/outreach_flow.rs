use kinnect_storage::*;
use kinnect_template::StatementFields;

use super::common::*;
use crate::handlers::contacts::{add_contact, list_contacts, NewContact};
use crate::handlers::outreach::{request_introductions, SkipReason};
use crate::handlers::DispatchOptions;
use crate::identity::resolve_or_create;
use crate::templates::TemplateOverride;

fn contact(name: &str, email: Option<&str>) -> NewContact {
    NewContact {
        name: name.to_string(),
        email: email.map(str::to_string),
        ..Default::default()
    }
}

#[tokio::test]
async fn outreach_creates_placeholder_and_links_contact() {
    let (server, outbox) = create_test_server().await;
    let referee = create_account(&server, "Rita", "rita@example.com", AccountRole::Referee).await;

    let entry = add_contact(&server, &referee.id, contact("Finn", Some("Finn@Example.com")))
        .await
        .unwrap();
    assert!(entry.linked_account_id.is_none());

    let options = DispatchOptions {
        statement: StatementFields {
            skills: vec!["Rust".into(), "Postgres".into()],
            company: Some("Acme".into()),
            ..Default::default()
        },
        message: Some("Would love your help".into()),
        ..Default::default()
    };
    let result = request_introductions(&server, &referee.id, &[entry.id.clone()], &options)
        .await
        .unwrap();

    assert_eq!(result.requested.len(), 1);
    assert!(result.skipped.is_empty());
    let (_, finn_id) = &result.requested[0];

    let finn = server.store.get_account(finn_id).await.unwrap();
    assert_eq!(finn.role, AccountRole::Unregistered);
    assert_eq!(finn.email.as_deref(), Some("finn@example.com"));

    let entries = list_contacts(&server, &referee.id).await.unwrap();
    assert_eq!(entries[0].linked_account_id.as_ref(), Some(finn_id));
    assert!(entries[0].last_requested_at.is_some());

    let sent = outbox.to("finn@example.com");
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].subject,
        "Rita would like your help with an introduction"
    );
    assert!(sent[0]
        .text
        .contains("I specialize in Rust and Postgres. I currently work at Acme."));
    assert!(sent[0].text.contains("Would love your help"));

    let records = server.store.list_notifications(finn_id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, NotificationKind::OutreachRequest);
    assert_eq!(records[0].sender_id.as_ref(), Some(&referee.id));
}

#[tokio::test]
async fn outreach_reports_skipped_entries() {
    let (server, outbox) = create_test_server().await;
    let referee = create_account(&server, "Rita", "rita@example.com", AccountRole::Referee).await;
    let other = create_account(&server, "Otto", "otto@example.com", AccountRole::Referee).await;

    let good = add_contact(&server, &referee.id, contact("Finn", Some("finn@example.com")))
        .await
        .unwrap();
    let no_channel = add_contact(&server, &referee.id, contact("Nobody", None))
        .await
        .unwrap();
    let not_owned = add_contact(&server, &other.id, contact("Gus", Some("gus@example.com")))
        .await
        .unwrap();
    let missing = ContactEntryId::new();

    let result = request_introductions(
        &server,
        &referee.id,
        &[
            good.id.clone(),
            no_channel.id.clone(),
            not_owned.id.clone(),
            missing.clone(),
        ],
        &DispatchOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(result.requested.len(), 1);
    assert_eq!(
        result.skipped,
        vec![
            (no_channel.id, SkipReason::NoContactChannel),
            (not_owned.id, SkipReason::NotOwned),
            (missing, SkipReason::NotFound),
        ]
    );
    assert_eq!(outbox.all().len(), 1);
    assert!(outbox.to("gus@example.com").is_empty());
}

#[tokio::test]
async fn outreach_to_registered_contact_reuses_account() {
    let (server, _outbox) = create_test_server().await;
    let referee = create_account(&server, "Rita", "rita@example.com", AccountRole::Referee).await;
    let finn = create_account(&server, "Finn", "finn@example.com", AccountRole::FirstDegree).await;

    let entry = add_contact(&server, &referee.id, contact("Finny", Some("finn@example.com")))
        .await
        .unwrap();
    assert_eq!(entry.linked_account_id.as_ref(), Some(&finn.id));

    let result = request_introductions(
        &server,
        &referee.id,
        &[entry.id.clone()],
        &DispatchOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(result.requested, vec![(entry.id, finn.id.clone())]);

    let stored = server.store.get_account(&finn.id).await.unwrap();
    assert_eq!(stored.name, "Finn");
    assert_eq!(stored.role, AccountRole::FirstDegree);
}

#[tokio::test]
async fn outreach_uses_dispatch_override() {
    let (server, outbox) = create_test_server().await;
    let referee = create_account(&server, "Rita", "rita@example.com", AccountRole::Referee).await;
    let entry = add_contact(&server, &referee.id, contact("Finn", Some("finn@example.com")))
        .await
        .unwrap();

    let options = DispatchOptions {
        template_override: Some(TemplateOverride {
            subject: Some("{recipient_name}, a quick favor for {sender_name}?".into()),
            ..Default::default()
        }),
        ..Default::default()
    };
    request_introductions(&server, &referee.id, &[entry.id], &options)
        .await
        .unwrap();

    assert_eq!(
        outbox.to("finn@example.com")[0].subject,
        "Finn, a quick favor for Rita?"
    );
}

#[tokio::test]
async fn resolve_or_create_is_idempotent_per_channel() {
    let (server, _outbox) = create_test_server().await;
    let store = server.store.as_ref();

    let first = resolve_or_create(store, Some("sam@example.com"), None, "Sam")
        .await
        .unwrap();
    let again = resolve_or_create(store, Some(" SAM@example.com "), None, "Samuel")
        .await
        .unwrap();
    assert_eq!(first.id, again.id);
    assert_eq!(again.name, "Sam");

    let by_phone = resolve_or_create(store, None, Some("+15550100"), "Pat")
        .await
        .unwrap();
    let by_phone_again = resolve_or_create(store, Some("pat@example.com"), Some("+15550100"), "Pat")
        .await
        .unwrap();
    assert_eq!(by_phone.id, by_phone_again.id);

    assert!(resolve_or_create(store, None, Some("  "), "Nobody")
        .await
        .is_err());
}
