//! Outbound SMS.

#[cfg(feature = "sms-twilio")]
mod twilio;

use crate::config::{SmsConfig, SmsProviderConfig};
use async_trait::async_trait;
use thiserror::Error;

/// SMS sending error
#[derive(Debug, Error)]
pub enum SmsError {
    #[error("Failed to send SMS: {0}")]
    SendFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Provider not available: {0}")]
    ProviderNotAvailable(String),
}

/// Trait for SMS providers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SmsProvider: Send + Sync {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), SmsError>;
}

/// Create an SMS provider from configuration
pub fn create_provider(config: &SmsConfig) -> Result<Box<dyn SmsProvider>, SmsError> {
    match &config.provider {
        #[cfg(feature = "sms-twilio")]
        SmsProviderConfig::Twilio {
            account_sid,
            auth_token,
            from_number,
        } => Ok(Box::new(twilio::TwilioProvider::new(
            account_sid.clone(),
            auth_token.clone(),
            from_number.clone(),
        )?)),
        #[cfg(not(feature = "sms-twilio"))]
        SmsProviderConfig::Twilio { .. } => Err(SmsError::ProviderNotAvailable(
            "Twilio support not compiled in. Enable the 'sms-twilio' feature.".to_string(),
        )),
    }
}
