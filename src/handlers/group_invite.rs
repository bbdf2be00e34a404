use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::config::SecretStore;
use crate::models::{FailedInvite, InviteReport};
use crate::services::email::{EmailService, MailerCredentials, OutgoingEmail};
use crate::services::error::{truncate_body, ProviderError};

/// Body of `POST /api/send-group-invite`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupInviteRequest {
    pub emails: Vec<String>,
    pub group_name: Option<String>,
    pub invite_url: Option<String>,
}

impl GroupInviteRequest {
    pub fn from_json(body: &Value) -> Self {
        let emails = body
            .get("emails")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|e| match e {
                        Value::String(s) => Some(s.trim().to_string()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let text = |key: &str| {
            body.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Self {
            emails,
            group_name: text("groupName"),
            invite_url: text("inviteUrl"),
        }
    }
}

#[derive(Debug, Error)]
pub enum InviteError {
    #[error("Missing required fields")]
    MissingFields,

    #[error("Set RESEND_API_KEY and INVITE_FROM_EMAIL in environment variables")]
    NotConfigured,
}

/// Sends group invitation emails one recipient at a time.
pub struct GroupInviteHandler {
    secrets: Arc<dyn SecretStore>,
    mailer: Arc<dyn EmailService>,
    app_name: String,
}

impl GroupInviteHandler {
    pub fn new(secrets: Arc<dyn SecretStore>, mailer: Arc<dyn EmailService>, app_name: String) -> Self {
        Self {
            secrets,
            mailer,
            app_name,
        }
    }

    pub async fn send_invites(&self, request: GroupInviteRequest) -> Result<InviteReport, InviteError> {
        let (group_name, invite_url) = match (request.group_name, request.invite_url) {
            (Some(group), Some(url)) if !request.emails.is_empty() => (group, url),
            _ => return Err(InviteError::MissingFields),
        };

        let credentials = match (self.secrets.get("RESEND_API_KEY"), self.secrets.get("INVITE_FROM_EMAIL")) {
            (Some(api_key), Some(from)) => MailerCredentials { api_key, from },
            _ => {
                log::error!("❌ RESEND_API_KEY or INVITE_FROM_EMAIL not configured");
                return Err(InviteError::NotConfigured);
            }
        };

        log::info!(
            "✉️ Sending {} invite(s) for group '{}'",
            request.emails.len(),
            group_name
        );

        let mut failed = Vec::new();
        for email in &request.emails {
            let message = self.compose(email, &group_name, &invite_url);
            if let Err(e) = self.mailer.send_email(&credentials, &message).await {
                log::warn!("⚠️ Invite to {} failed: {}", email, e);
                failed.push(FailedInvite {
                    email: email.clone(),
                    error: failure_text(&e),
                });
            }
        }

        Ok(InviteReport {
            sent: request.emails.len() - failed.len(),
            failed,
        })
    }

    fn compose(&self, to: &str, group_name: &str, invite_url: &str) -> OutgoingEmail {
        OutgoingEmail {
            to: to.to_string(),
            subject: format!("Join {} on {}", group_name, self.app_name),
            text: format!(
                "Hi,\n\nYou've been invited to join \"{}\" on {}.\n\nJoin link: {}\n\nAdmin approval may be required before entering the group.\n",
                group_name, self.app_name, invite_url
            ),
        }
    }
}

/// Per-recipient error text: the provider's own body when it sent one.
fn failure_text(err: &ProviderError) -> String {
    match err {
        ProviderError::Status { body, .. } => body.clone(),
        other => truncate_body(&other.to_string()),
    }
}
