use std::sync::Arc;

use kinnect_storage::Store;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::config::ServerConfig;
use crate::email::{self, EmailError};
use crate::notify::Notifier;
use crate::sms::{self, SmsError};
use crate::templates::{TemplateError, TemplateSet};

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("email provider: {0}")]
    Email(#[from] EmailError),
    #[error("sms provider: {0}")]
    Sms(#[from] SmsError),
    #[error("templates: {0}")]
    Templates(#[from] TemplateError),
}

/// Everything a workflow operation needs, built once per process.
#[derive(Clone)]
pub struct KinnectServer {
    pub store: Arc<dyn Store>,
    pub notifier: Arc<Notifier>,
    pub public_base_url: Url,
}

impl KinnectServer {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<Notifier>, public_base_url: Url) -> Self {
        Self {
            store,
            notifier,
            public_base_url,
        }
    }

    /// Build providers and templates from configuration.
    pub fn from_config(store: Arc<dyn Store>, config: &ServerConfig) -> Result<Self, SetupError> {
        let email = config.email.as_ref().map(email::create_provider).transpose()?;
        let sms = config.sms.as_ref().map(sms::create_provider).transpose()?;
        let templates = match &config.templates_path {
            Some(path) => {
                info!(path = %path.display(), "Loading message templates");
                TemplateSet::load(path)?
            }
            None => TemplateSet::defaults(),
        };
        let sender = config
            .email
            .as_ref()
            .map(|e| e.sender())
            .unwrap_or_default();

        if email.is_none() {
            info!("No email provider configured; email notifications are disabled");
        }
        if sms.is_none() {
            info!("No SMS provider configured; SMS notifications are disabled");
        }

        let notifier = Notifier::new(store.clone(), email, sms, sender, templates);
        Ok(Self::new(
            store,
            Arc::new(notifier),
            config.public_base_url.clone(),
        ))
    }
}
