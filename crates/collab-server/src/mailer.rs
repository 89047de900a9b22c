//! Invite email delivery.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::config::{Config, MailConfig};
use crate::error::AppError;

/// Landing page link for an invite token.
pub fn invite_link(base_url: &str, token: &str) -> String {
    format!("{}/invite/{}", base_url.trim_end_matches('/'), token)
}

#[async_trait]
pub trait InviteMailer: Send + Sync {
    /// Deliver the invite and return the link the invitee should open.
    async fn send_invite_email(
        &self,
        to_email: &str,
        workspace_name: &str,
        inviter_name: &str,
        token: &str,
    ) -> Result<String, AppError>;
}

/// Skips delivery; the caller shares the returned link itself.
#[derive(Debug, Clone)]
pub struct LinkMailer {
    base_url: String,
}

impl LinkMailer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl InviteMailer for LinkMailer {
    async fn send_invite_email(
        &self,
        to_email: &str,
        _workspace_name: &str,
        _inviter_name: &str,
        token: &str,
    ) -> Result<String, AppError> {
        tracing::debug!(to = %to_email, "Email delivery disabled, returning invite link");
        Ok(invite_link(&self.base_url, token))
    }
}

fn invite_subject(inviter_name: &str, workspace_name: &str) -> String {
    // Header injection guard; names come straight from users.
    let clean = |s: &str| s.replace(['\r', '\n'], " ");
    format!(
        "{} invited you to join {}",
        clean(inviter_name),
        clean(workspace_name)
    )
}

fn invite_text(inviter_name: &str, workspace_name: &str, url: &str) -> String {
    format!(
        "{} has invited you to join \"{}\".\n\nAccept the invitation: {}\n",
        inviter_name, workspace_name, url
    )
}

/// Sends through a JSON mail API (`POST {from, to, subject, text}` with a
/// bearer key).
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    config: MailConfig,
    base_url: String,
}

impl HttpMailer {
    pub fn new(config: MailConfig, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl InviteMailer for HttpMailer {
    async fn send_invite_email(
        &self,
        to_email: &str,
        workspace_name: &str,
        inviter_name: &str,
        token: &str,
    ) -> Result<String, AppError> {
        let url = invite_link(&self.base_url, token);
        // Plain text only: both names are user-supplied.
        let body = json!({
            "from": self.config.from,
            "to": [to_email],
            "subject": invite_subject(inviter_name, workspace_name),
            "text": invite_text(inviter_name, workspace_name, &url),
        });

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to send invite email: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(anyhow::anyhow!(
                "Mail API returned {}: {}",
                status,
                text
            )));
        }

        tracing::info!(to = %to_email, workspace = %workspace_name, "Invite email sent");
        Ok(url)
    }
}

pub fn mailer_from_config(config: &Config) -> Arc<dyn InviteMailer> {
    match &config.mail {
        Some(mail) => Arc::new(HttpMailer::new(mail.clone(), config.app_base_url.clone())),
        None => Arc::new(LinkMailer::new(config.app_base_url.clone())),
    }
}
