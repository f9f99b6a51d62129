//! SMTP delivery through an authenticated STARTTLS relay.

use super::Notifier;
use crate::config::MailConfig;
use crate::error::DeliveryError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

/// Plain-text digest body.
pub fn render_body(display_name: &str, request_count: u32, seen_count: u32) -> String {
    format!(
        "Hello {},\n\nRequestCount: {}\nSeenCount: {}",
        display_name, request_count, seen_count
    )
}

fn parse_mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| DeliveryError::InvalidAddress {
            address: address.to_string(),
            message: e.to_string(),
        })
}

/// Build the digest message for one recipient.
pub fn build_message(
    from: &str,
    subject: &str,
    recipient_email: &str,
    display_name: &str,
    request_count: u32,
    seen_count: u32,
) -> Result<Message, DeliveryError> {
    Message::builder()
        .from(parse_mailbox(from)?)
        .to(parse_mailbox(recipient_email)?)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(render_body(display_name, request_count, seen_count))
        .map_err(|e| DeliveryError::Message(e.to_string()))
}

/// [`Notifier`] that mails the digest over SMTP.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    subject: String,
}

impl SmtpNotifier {
    /// Set up the relay transport. No connection is made until the first send.
    pub fn new(config: &MailConfig) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .with_context(|| format!("Invalid SMTP relay host: {}", config.host))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            from: config.from.clone(),
            subject: config.subject.clone(),
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_notification(
        &self,
        recipient_email: &str,
        display_name: &str,
        request_count: u32,
        seen_count: u32,
    ) -> Result<(), DeliveryError> {
        let message = build_message(
            &self.from,
            &self.subject,
            recipient_email,
            display_name,
            request_count,
            seen_count,
        )?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        debug!("Relay answered {} for {}", response.code(), recipient_email);
        Ok(())
    }
}
