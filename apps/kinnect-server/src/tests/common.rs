//! Common test helpers for workflow tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kinnect_storage::*;
use kinnect_store_sqlite::SqliteStore;
use url::Url;

use crate::email::{EmailContent, EmailError, EmailProvider};
use crate::handlers::accounts::{register_account, Registration};
use crate::notify::Notifier;
use crate::server::KinnectServer;
use crate::templates::TemplateSet;

pub const BASE_URL: &str = "https://kinnect.test";

/// One email captured by [`Outbox`].
#[derive(Clone, Debug)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
}

/// Email provider that keeps everything it is asked to send.
#[derive(Clone, Default)]
pub struct Outbox {
    sent: Arc<Mutex<Vec<SentEmail>>>,
}

impl Outbox {
    pub fn all(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn to(&self, address: &str) -> Vec<SentEmail> {
        self.all().into_iter().filter(|m| m.to == address).collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl EmailProvider for Outbox {
    async fn send_email(
        &self,
        _from: &str,
        to: &str,
        content: &EmailContent,
    ) -> Result<(), EmailError> {
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: content.subject.clone(),
            text: content.text.clone(),
        });
        Ok(())
    }
}

/// Test helper: Create a KinnectServer with in-memory SQLite and a capturing
/// email provider. No SMS provider is configured.
pub async fn create_test_server() -> (KinnectServer, Outbox) {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let outbox = Outbox::default();
    let notifier = Notifier::new(
        store.clone(),
        Some(Box::new(outbox.clone())),
        None,
        "Kinnect <hello@kinnect.test>".to_string(),
        TemplateSet::defaults(),
    );
    let server = KinnectServer::new(store, Arc::new(notifier), Url::parse(BASE_URL).unwrap());
    (server, outbox)
}

/// Test helper: Register an account with an email.
pub async fn create_account(
    server: &KinnectServer,
    name: &str,
    email: &str,
    role: AccountRole,
) -> Account {
    register_account(
        server,
        Registration {
            name: name.to_string(),
            email: Some(email.to_string()),
            phone: None,
            handle: None,
            role,
        },
    )
    .await
    .unwrap()
}

/// Notification kinds recorded for an account, oldest first.
pub async fn notification_kinds(
    server: &KinnectServer,
    account_id: &AccountId,
) -> Vec<NotificationKind> {
    let records = server.store.list_notifications(account_id).await.unwrap();
    records.into_iter().rev().map(|n| n.kind).collect()
}

/// Test helper: The sign-in token carried by a message body.
pub fn token_in(text: &str) -> String {
    let start = text.find("token=").expect("message has no sign-in link") + "token=".len();
    text[start..]
        .chars()
        .take_while(|c| c.is_ascii_hexdigit())
        .collect()
}
