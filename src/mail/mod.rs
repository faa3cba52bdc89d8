//! Outgoing email.
//!
//! Delivery is best-effort: callers go through [`send_best_effort`], which
//! logs failures and never propagates them.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use thiserror::Error;

use crate::config::{MailConfig, MailTransport};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Could not build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("{0}")]
    Other(String),
}

/// Plain-text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
}

impl MailMessage {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            text: text.into(),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), MailError>;
}

/// Send a message, logging and swallowing any failure.
pub async fn send_best_effort(mailer: &dyn Mailer, message: MailMessage) {
    let to = message.to.clone();
    if let Err(e) = mailer.send(message).await {
        tracing::warn!("Could not send mail to {}: {}", to, e);
    }
}

pub fn from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>, MailError> {
    match config.transport {
        MailTransport::Log => Ok(Arc::new(LogMailer)),
        MailTransport::Smtp => Ok(Arc::new(SmtpMailer::new(config)?)),
    }
}

/// Transport which only logs what it would have sent
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        tracing::info!(
            "Mail (log transport)\nTo: {}\nSubject: {}\n\n{}",
            message.to,
            message.subject,
            message.text
        );
        Ok(())
    }
}

pub struct SmtpMailer {
    sender: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let host = config
            .smtp_host
            .as_deref()
            .ok_or(MailError::ConfigMissing("SMTP_HOST"))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?.port(config.smtp_port);
        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            sender: config.from.parse()?,
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        let email = lettre::Message::builder()
            .from(self.sender.clone())
            .to(message.to.parse()?)
            .subject(message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.text)?;

        self.transport.send(email).await?;
        Ok(())
    }
}
