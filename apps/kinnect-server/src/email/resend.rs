//! Resend email provider implementation.

use super::{EmailContent, EmailError, EmailProvider};
use async_trait::async_trait;
use resend_rs::{types::CreateEmailBaseOptions, Resend};

/// Resend email provider.
pub struct ResendProvider {
    client: Resend,
}

impl ResendProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Resend::new(&api_key),
        }
    }
}

#[async_trait]
impl EmailProvider for ResendProvider {
    async fn send_email(
        &self,
        from: &str,
        to: &str,
        content: &EmailContent,
    ) -> Result<(), EmailError> {
        let email = CreateEmailBaseOptions::new(from, vec![to.to_string()], &content.subject)
            .with_text(&content.text)
            .with_html(&content.html);

        self.client
            .emails
            .send(email)
            .await
            .map_err(|e| EmailError::SendFailed(e.to_string()))?;

        Ok(())
    }
}
