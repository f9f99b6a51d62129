//! Outbound notifications.

pub mod smtp;

pub use smtp::SmtpNotifier;

use crate::error::DeliveryError;
use async_trait::async_trait;

/// Delivers one notification to one recipient.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_notification(
        &self,
        recipient_email: &str,
        display_name: &str,
        request_count: u32,
        seen_count: u32,
    ) -> Result<(), DeliveryError>;
}
