//! Twilio SMS provider using the Messages REST resource.

use std::time::Duration;

use super::{SmsError, SmsProvider};
use async_trait::async_trait;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

pub struct TwilioProvider {
    http_client: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl TwilioProvider {
    pub fn new(
        account_sid: String,
        auth_token: String,
        from_number: String,
    ) -> Result<Self, SmsError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SmsError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            account_sid,
            auth_token,
            from_number,
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/Accounts/{}/Messages.json",
            TWILIO_API_BASE, self.account_sid
        )
    }
}

#[async_trait]
impl SmsProvider for TwilioProvider {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), SmsError> {
        let params = [("To", to), ("From", self.from_number.as_str()), ("Body", body)];

        let response = self
            .http_client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| SmsError::SendFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SmsError::SendFailed(format!(
                "HTTP {} from Twilio",
                response.status()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_url() {
        let provider = TwilioProvider::new(
            "AC123".to_string(),
            "token".to_string(),
            "+15550001111".to_string(),
        )
        .unwrap();
        assert_eq!(
            provider.messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
    }
}
