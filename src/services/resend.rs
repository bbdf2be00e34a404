use serde::Serialize;

use super::email::{EmailService, MailerCredentials, OutgoingEmail};
use super::error::ProviderError;

const PROVIDER: &str = "Resend";

/// Resend transactional email API client
pub struct ResendClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

impl ResendClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, "https://api.resend.com".to_string())
    }

    pub fn with_base_url(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait::async_trait]
impl EmailService for ResendClient {
    async fn send_email(
        &self,
        credentials: &MailerCredentials,
        email: &OutgoingEmail,
    ) -> Result<(), ProviderError> {
        let payload = SendEmailRequest {
            from: &credentials.from,
            to: [email.to.as_str()],
            subject: &email.subject,
            text: &email.text,
        };

        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .header("Authorization", format!("Bearer {}", credentials.api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .map_err(|e| ProviderError::transport(PROVIDER, e))?;
            log::error!("❌ Resend API error ({}) for {}: {}", status, email.to, error_text);
            return Err(ProviderError::status(PROVIDER, status, &error_text));
        }

        log::info!("📤 Invite email sent to {}", email.to);
        Ok(())
    }
}
