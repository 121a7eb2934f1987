//! Outbound email.
//!
//! Providers only deliver already-rendered content. Everything the recipient
//! reads is produced by the template layer before it gets here.

#[cfg(feature = "email-resend")]
mod resend;
#[cfg(feature = "email-smtp")]
mod smtp;

use crate::config::{EmailConfig, EmailProviderConfig};
use async_trait::async_trait;
use thiserror::Error;

/// Email sending error
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Failed to send email: {0}")]
    SendFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Provider not available: {0}")]
    ProviderNotAvailable(String),
}

/// A rendered email.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Trait for email providers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Deliver one message. `from` is a full mailbox (`Name <addr>` or `addr`).
    async fn send_email(
        &self,
        from: &str,
        to: &str,
        content: &EmailContent,
    ) -> Result<(), EmailError>;
}

/// Create an email provider from configuration
pub fn create_provider(config: &EmailConfig) -> Result<Box<dyn EmailProvider>, EmailError> {
    match &config.provider {
        #[cfg(feature = "email-resend")]
        EmailProviderConfig::Resend { api_key } => {
            Ok(Box::new(resend::ResendProvider::new(api_key.clone())))
        }
        #[cfg(not(feature = "email-resend"))]
        EmailProviderConfig::Resend { .. } => Err(EmailError::ProviderNotAvailable(
            "Resend support not compiled in. Enable the 'email-resend' feature.".to_string(),
        )),
        #[cfg(feature = "email-smtp")]
        EmailProviderConfig::Smtp {
            host,
            port,
            username,
            password,
            use_tls,
        } => {
            let provider = smtp::SmtpProvider::new(
                host.clone(),
                *port,
                username.clone(),
                password.clone(),
                *use_tls,
            )?;
            Ok(Box::new(provider))
        }
        #[cfg(not(feature = "email-smtp"))]
        EmailProviderConfig::Smtp { .. } => Err(EmailError::ProviderNotAvailable(
            "SMTP support not compiled in. Enable the 'email-smtp' feature.".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "email-smtp")]
    #[tokio::test]
    async fn test_create_smtp_provider() {
        let config = EmailConfig {
            provider: EmailProviderConfig::Smtp {
                host: "localhost".to_string(),
                port: 25,
                username: None,
                password: None,
                use_tls: false,
            },
            from_address: "noreply@example.com".to_string(),
            from_name: None,
        };
        assert!(create_provider(&config).is_ok());
    }

    #[cfg(feature = "email-resend")]
    #[test]
    fn test_create_resend_provider() {
        let config = EmailConfig {
            provider: EmailProviderConfig::Resend {
                api_key: "re_test_key".to_string(),
            },
            from_address: "noreply@example.com".to_string(),
            from_name: Some("Kinnect".to_string()),
        };
        assert!(create_provider(&config).is_ok());
    }
}
