//! Notification fan-out.
//!
//! Every message goes out as its own independent task. A failed channel or
//! recipient is recorded in the [`DeliveryReport`] and logged; it never turns
//! into an error, because the state change that triggered the message has
//! already been committed.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use kinnect_storage::{
    Account, AccountId, Channel, CreateNotificationParams, NotificationId, NotificationKind, Store,
};
use kinnect_template::TemplateValues;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::email::{EmailContent, EmailProvider};
use crate::sms::SmsProvider;
use crate::templates::{RenderedMessage, TemplateOverride, TemplateSet};

/// Channels a dispatch is allowed to use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelFlags {
    pub email: bool,
    pub sms: bool,
}

impl Default for ChannelFlags {
    fn default() -> Self {
        Self {
            email: true,
            sms: true,
        }
    }
}

/// Where a message goes. Introduced parties may not have an account yet, in
/// which case the message is delivered but no notification record is kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recipient {
    pub account_id: Option<AccountId>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl From<&Account> for Recipient {
    fn from(account: &Account) -> Self {
        Self {
            account_id: Some(account.id.clone()),
            name: account.name.clone(),
            email: account.email.clone(),
            phone: account.phone.clone(),
        }
    }
}

/// One message to render and deliver.
#[derive(Clone, Debug)]
pub struct OutboundMessage {
    pub kind: NotificationKind,
    pub sender_id: Option<AccountId>,
    pub recipient: Recipient,
    pub values: TemplateValues,
    pub template_override: Option<TemplateOverride>,
    pub channels: ChannelFlags,
}

impl OutboundMessage {
    pub fn new(kind: NotificationKind, recipient: impl Into<Recipient>) -> Self {
        Self {
            kind,
            sender_id: None,
            recipient: recipient.into(),
            values: TemplateValues::new(),
            template_override: None,
            channels: ChannelFlags::default(),
        }
    }

    pub fn from_sender(mut self, sender_id: &AccountId) -> Self {
        self.sender_id = Some(sender_id.clone());
        self
    }

    pub fn value(mut self, name: &str, value: impl Into<String>) -> Self {
        self.values.set(name, value);
        self
    }

    pub fn with_override(mut self, over: Option<&TemplateOverride>) -> Self {
        self.template_override = over.cloned();
        self
    }

    pub fn with_channels(mut self, channels: ChannelFlags) -> Self {
        self.channels = channels;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelOutcome {
    Sent,
    Failed(String),
    /// Channel disabled for this dispatch, no provider configured, or no
    /// address to send to.
    Skipped,
}

/// What happened for one recipient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecipientDelivery {
    pub kind: NotificationKind,
    pub receiver_id: Option<AccountId>,
    pub notification_id: Option<NotificationId>,
    pub email: ChannelOutcome,
    pub sms: ChannelOutcome,
}

impl RecipientDelivery {
    /// At least one channel accepted the message.
    pub fn delivered(&self) -> bool {
        self.email == ChannelOutcome::Sent || self.sms == ChannelOutcome::Sent
    }

    pub fn failed(&self) -> bool {
        matches!(self.email, ChannelOutcome::Failed(_))
            || matches!(self.sms, ChannelOutcome::Failed(_))
    }
}

/// Collected per-recipient results of a fan-out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub deliveries: Vec<RecipientDelivery>,
}

impl DeliveryReport {
    pub fn any_failed(&self) -> bool {
        self.deliveries.iter().any(RecipientDelivery::failed)
    }

    #[cfg(test)]
    pub fn for_receiver(&self, id: &AccountId) -> Option<&RecipientDelivery> {
        self.deliveries
            .iter()
            .find(|d| d.receiver_id.as_ref() == Some(id))
    }

    pub fn len(&self) -> usize {
        self.deliveries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }
}

/// Renders and delivers messages over the configured channels.
pub struct Notifier {
    store: Arc<dyn Store>,
    email: Option<Box<dyn EmailProvider>>,
    sms: Option<Box<dyn SmsProvider>>,
    email_sender: String,
    templates: TemplateSet,
}

impl Notifier {
    pub fn new(
        store: Arc<dyn Store>,
        email: Option<Box<dyn EmailProvider>>,
        sms: Option<Box<dyn SmsProvider>>,
        email_sender: String,
        templates: TemplateSet,
    ) -> Self {
        Self {
            store,
            email,
            sms,
            email_sender,
            templates,
        }
    }

    /// Deliver all messages concurrently. Never fails.
    pub async fn notify(&self, messages: Vec<OutboundMessage>) -> DeliveryReport {
        let deliveries = join_all(messages.into_iter().map(|m| self.deliver(m))).await;
        DeliveryReport { deliveries }
    }

    pub async fn notify_one(&self, message: OutboundMessage) -> DeliveryReport {
        self.notify(vec![message]).await
    }

    fn render(&self, message: &OutboundMessage) -> RenderedMessage {
        let template = self
            .templates
            .resolve(message.kind, message.template_override.as_ref());
        let mut values = message.values.clone();
        values.set("recipient_name", message.recipient.name.clone());
        if values.get("action_url").is_none() {
            values.set("action_url", "");
        }
        template.render(&values)
    }

    async fn deliver(&self, message: OutboundMessage) -> RecipientDelivery {
        let rendered = self.render(&message);
        let recipient = &message.recipient;

        let email_to = recipient
            .email
            .as_deref()
            .filter(|_| message.channels.email)
            .and_then(|to| self.email.as_deref().map(|p| (p, to)));
        let sms_to = recipient
            .phone
            .as_deref()
            .filter(|_| message.channels.sms)
            .and_then(|to| self.sms.as_deref().map(|p| (p, to)));

        let notification_id = match &recipient.account_id {
            Some(receiver_id) => self
                .record(&message, receiver_id, &rendered, email_to.is_some(), sms_to.is_some())
                .await,
            None => None,
        };

        let content = EmailContent {
            subject: rendered.subject.clone(),
            text: rendered.text.clone(),
            html: rendered.html.clone(),
        };

        let email_fut = async {
            match email_to {
                Some((provider, to)) => {
                    match provider.send_email(&self.email_sender, to, &content).await {
                        Ok(()) => ChannelOutcome::Sent,
                        Err(e) => ChannelOutcome::Failed(e.to_string()),
                    }
                }
                None => ChannelOutcome::Skipped,
            }
        };
        let sms_fut = async {
            match sms_to {
                Some((provider, to)) => match provider.send_sms(to, &rendered.sms).await {
                    Ok(()) => ChannelOutcome::Sent,
                    Err(e) => ChannelOutcome::Failed(e.to_string()),
                },
                None => ChannelOutcome::Skipped,
            }
        };
        let (email, sms) = futures::join!(email_fut, sms_fut);

        for (channel, outcome) in [(Channel::Email, &email), (Channel::Sms, &sms)] {
            match outcome {
                ChannelOutcome::Sent => {
                    if let Some(id) = &notification_id {
                        if let Err(e) = self
                            .store
                            .mark_notification_sent(id, channel, Utc::now())
                            .await
                        {
                            warn!(notification_id = %id, ?channel, error = %e, "Failed to stamp send time");
                        }
                    }
                }
                ChannelOutcome::Failed(reason) => {
                    warn!(
                        kind = message.kind.as_str(),
                        receiver = ?recipient.account_id,
                        ?channel,
                        error = %reason,
                        "Notification delivery failed"
                    );
                }
                ChannelOutcome::Skipped => {}
            }
        }

        debug!(kind = message.kind.as_str(), ?email, ?sms, "Notification delivered");

        RecipientDelivery {
            kind: message.kind,
            receiver_id: recipient.account_id.clone(),
            notification_id,
            email,
            sms,
        }
    }

    async fn record(
        &self,
        message: &OutboundMessage,
        receiver_id: &AccountId,
        rendered: &RenderedMessage,
        email_attempted: bool,
        sms_attempted: bool,
    ) -> Option<NotificationId> {
        let params = CreateNotificationParams {
            sender_id: message.sender_id.clone(),
            receiver_id: receiver_id.clone(),
            kind: message.kind,
            subject: rendered.subject.clone(),
            body: rendered.html.clone(),
            email_attempted,
            sms_attempted,
        };
        match self.store.create_notification(&params).await {
            Ok(record) => Some(record.id),
            Err(e) => {
                warn!(receiver = %receiver_id, error = %e, "Failed to record notification");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::{EmailError, MockEmailProvider};
    use crate::sms::{MockSmsProvider, SmsError};
    use kinnect_storage::{AccountRole, CreateAccountParams};
    use kinnect_store_sqlite::SqliteStore;

    async fn store_with_account(
        email: Option<&str>,
        phone: Option<&str>,
    ) -> (Arc<dyn Store>, Account) {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::open_in_memory().await.unwrap());
        let account = store
            .create_account(&CreateAccountParams {
                name: "Ada".into(),
                email: email.map(str::to_string),
                phone: phone.map(str::to_string),
                handle: None,
                role: AccountRole::Referee,
            })
            .await
            .unwrap();
        (store, account)
    }

    fn message(account: &Account) -> OutboundMessage {
        OutboundMessage::new(NotificationKind::IntroductionMutual, account)
            .value("other_name", "Bob")
            .value("other_contact", "bob@example.com")
            .value("sender_name", "Ivy")
    }

    #[tokio::test]
    async fn sends_both_channels_and_records() {
        let (store, account) = store_with_account(Some("ada@example.com"), Some("+1555")).await;

        let mut email = MockEmailProvider::new();
        email
            .expect_send_email()
            .withf(|from, to, content| {
                from == "Kinnect <hi@k.example>"
                    && to == "ada@example.com"
                    && content.subject == "You and Bob are connected"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        let mut sms = MockSmsProvider::new();
        sms.expect_send_sms()
            .withf(|to, body| to == "+1555" && body.contains("bob@example.com"))
            .times(1)
            .returning(|_, _| Ok(()));

        let notifier = Notifier::new(
            store.clone(),
            Some(Box::new(email)),
            Some(Box::new(sms)),
            "Kinnect <hi@k.example>".into(),
            TemplateSet::defaults(),
        );

        let report = notifier.notify_one(message(&account)).await;
        assert!(!report.any_failed());
        let delivery = report.for_receiver(&account.id).unwrap();
        assert_eq!(delivery.email, ChannelOutcome::Sent);
        assert_eq!(delivery.sms, ChannelOutcome::Sent);

        let records = store.list_notifications(&account.id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].email_attempted && records[0].sms_attempted);
        assert!(records[0].email_sent_at.is_some());
        assert!(records[0].sms_sent_at.is_some());
    }

    #[tokio::test]
    async fn channel_failure_is_reported_not_raised() {
        let (store, account) = store_with_account(Some("ada@example.com"), Some("+1555")).await;

        let mut email = MockEmailProvider::new();
        email
            .expect_send_email()
            .returning(|_, _, _| Err(EmailError::SendFailed("smtp down".into())));
        let mut sms = MockSmsProvider::new();
        sms.expect_send_sms().returning(|_, _| Ok(()));

        let notifier = Notifier::new(
            store.clone(),
            Some(Box::new(email)),
            Some(Box::new(sms)),
            "hi@k.example".into(),
            TemplateSet::defaults(),
        );

        let report = notifier.notify_one(message(&account)).await;
        assert!(report.any_failed());
        let delivery = report.for_receiver(&account.id).unwrap();
        assert!(matches!(delivery.email, ChannelOutcome::Failed(_)));
        assert_eq!(delivery.sms, ChannelOutcome::Sent);
        assert!(delivery.delivered());

        let records = store.list_notifications(&account.id).await.unwrap();
        assert!(records[0].email_attempted);
        assert!(records[0].email_sent_at.is_none());
        assert!(records[0].sms_sent_at.is_some());
    }

    #[tokio::test]
    async fn one_recipient_failing_does_not_block_another() {
        let (store, ada) = store_with_account(Some("ada@example.com"), None).await;
        let bob = store
            .create_account(&CreateAccountParams {
                name: "Bob".into(),
                email: Some("bob@example.com".into()),
                phone: None,
                handle: None,
                role: AccountRole::Referral,
            })
            .await
            .unwrap();

        let mut email = MockEmailProvider::new();
        email
            .expect_send_email()
            .times(2)
            .returning(|_, to, _| {
                if to == "ada@example.com" {
                    Err(EmailError::SendFailed("bounced".into()))
                } else {
                    Ok(())
                }
            });

        let notifier = Notifier::new(
            store.clone(),
            Some(Box::new(email)),
            None,
            "hi@k.example".into(),
            TemplateSet::defaults(),
        );

        let report = notifier.notify(vec![message(&ada), message(&bob)]).await;
        assert_eq!(report.len(), 2);
        assert!(report.for_receiver(&ada.id).unwrap().failed());
        assert_eq!(
            report.for_receiver(&bob.id).unwrap().email,
            ChannelOutcome::Sent
        );
    }

    #[tokio::test]
    async fn disabled_or_unconfigured_channels_are_skipped() {
        let (store, account) = store_with_account(Some("ada@example.com"), Some("+1555")).await;

        let mut email = MockEmailProvider::new();
        email.expect_send_email().times(0);

        let notifier = Notifier::new(
            store.clone(),
            Some(Box::new(email)),
            None,
            "hi@k.example".into(),
            TemplateSet::defaults(),
        );

        let msg = message(&account).with_channels(ChannelFlags {
            email: false,
            sms: true,
        });
        let report = notifier.notify_one(msg).await;
        let delivery = report.for_receiver(&account.id).unwrap();
        assert_eq!(delivery.email, ChannelOutcome::Skipped);
        assert_eq!(delivery.sms, ChannelOutcome::Skipped);
        assert!(!report.any_failed());
        assert!(!delivery.delivered());

        let records = store.list_notifications(&account.id).await.unwrap();
        assert!(!records[0].email_attempted);
        assert!(!records[0].sms_attempted);
    }

    #[tokio::test]
    async fn recipient_without_account_is_delivered_unrecorded() {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::open_in_memory().await.unwrap());

        let mut email = MockEmailProvider::new();
        email
            .expect_send_email()
            .withf(|_, to, _| to == "new@example.com")
            .times(1)
            .returning(|_, _, _| Ok(()));
        let mut sms = MockSmsProvider::new();
        sms.expect_send_sms()
            .times(0)
            .returning(|_, _| Err(SmsError::SendFailed("unused".into())));

        let notifier = Notifier::new(
            store,
            Some(Box::new(email)),
            Some(Box::new(sms)),
            "hi@k.example".into(),
            TemplateSet::defaults(),
        );

        let recipient = Recipient {
            account_id: None,
            name: "New".into(),
            email: Some("new@example.com".into()),
            phone: None,
        };
        let report = notifier
            .notify_one(
                OutboundMessage::new(NotificationKind::IntroductionRequest, recipient)
                    .value("other_name", "Bob")
                    .value("sender_name", "Ivy"),
            )
            .await;
        let delivery = &report.deliveries[0];
        assert_eq!(delivery.email, ChannelOutcome::Sent);
        assert!(delivery.notification_id.is_none());
    }

    #[tokio::test]
    async fn dispatch_override_is_used() {
        let (store, account) = store_with_account(Some("ada@example.com"), None).await;

        let mut email = MockEmailProvider::new();
        email
            .expect_send_email()
            .withf(|_, _, content| content.subject == "Psst, Ada")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let notifier = Notifier::new(
            store,
            Some(Box::new(email)),
            None,
            "hi@k.example".into(),
            TemplateSet::defaults(),
        );

        let over = TemplateOverride {
            subject: Some("Psst, {recipient_name}".into()),
            ..Default::default()
        };
        let report = notifier
            .notify_one(message(&account).with_override(Some(&over)))
            .await;
        assert!(!report.any_failed());
    }
}
