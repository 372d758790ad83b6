//! # Outbound Email
//!
//! [`HttpMailer`] posts messages to a JSON mail relay:
//!
//! ```text
//! POST {relay_url}
//! Authorization: Bearer {relay_token}
//! {"from", "to", "subject", "html", "attachments": [{"filename", "contentType", "content"}]}
//! ```
//!
//! Attachment content is base64. [`LogMailer`] is used when no relay is
//! configured and only records the message in the log.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde::Serialize;

use crate::config::MailerConfig;
use crate::error::ClientError;

/// A file attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// An outgoing email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<Attachment>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), ClientError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayAttachment<'a> {
    filename: &'a str,
    content_type: &'a str,
    content: String,
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    attachments: Vec<RelayAttachment<'a>>,
}

/// Mail relay client.
#[derive(Debug, Clone)]
pub struct HttpMailer {
    http: reqwest::Client,
    config: MailerConfig,
}

impl HttpMailer {
    pub fn new(config: MailerConfig) -> Result<Self, ClientError> {
        if config.relay_url.is_none() {
            return Err(ClientError::NotConfigured("MAIL_RELAY_URL"));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClientError::Http {
                endpoint: "mail client init".into(),
                source: e,
            })?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), ClientError> {
        let endpoint = "POST mail relay";
        let url = self
            .config
            .relay_url
            .as_ref()
            .ok_or(ClientError::NotConfigured("MAIL_RELAY_URL"))?;

        let message = RelayMessage {
            from: &self.config.from,
            to: &mail.to,
            subject: &mail.subject,
            html: &mail.html,
            attachments: mail
                .attachments
                .iter()
                .map(|a| RelayAttachment {
                    filename: &a.filename,
                    content_type: &a.content_type,
                    content: base64::engine::general_purpose::STANDARD.encode(&a.content),
                })
                .collect(),
        };

        let mut req = self.http.post(url.as_str()).json(&message);
        if let Some(token) = &self.config.relay_token {
            req = req.bearer_auth(token.as_str());
        }
        let resp = req
            .send()
            .await
            .map_err(|e| ClientError::transport(endpoint, e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                endpoint: endpoint.into(),
                status,
                body,
            });
        }
        tracing::info!(to = %mail.to, subject = %mail.subject, "mail relayed");
        Ok(())
    }
}

/// Development mailer: logs instead of sending.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), ClientError> {
        tracing::info!(
            to = %mail.to,
            subject = %mail.subject,
            attachments = mail.attachments.len(),
            "mail relay not configured; message logged only"
        );
        tracing::debug!(html = %mail.html, "logged message body");
        Ok(())
    }
}
