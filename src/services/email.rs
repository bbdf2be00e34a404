use super::error::ProviderError;

/// Account used to send mail: provider key plus verified sender address.
#[derive(Clone)]
pub struct MailerCredentials {
    pub api_key: String,
    pub from: String,
}

impl std::fmt::Debug for MailerCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailerCredentials")
            .field("api_key", &"<redacted>")
            .field("from", &self.from)
            .finish()
    }
}

/// Plain-text email to a single recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
}

// Transactional email provider
#[async_trait::async_trait]
pub trait EmailService: Send + Sync {
    async fn send_email(
        &self,
        credentials: &MailerCredentials,
        email: &OutgoingEmail,
    ) -> Result<(), ProviderError>;
}
