//! # Notification Delivery
//!
//! The consolidated alert leaves the notifier through a [`NotificationSink`].
//! Mail transport is outside this crate: sinks either hand the message to a
//! delivery pipeline (see `database::PgNotificationOutbox`) or just log it.

pub mod html;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NotificationError {
    #[error("notification rejected: {0}")]
    Rejected(String),
    #[error("notification transport failed: {0}")]
    Transport(String),
    #[error("notification body could not be rendered: {0}")]
    Render(String),
}

/// One alert message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub author: Option<String>,
    pub recipients: Vec<String>,
    pub bcc: Vec<String>,
    pub reply_to: Option<String>,
    pub subject: String,
    pub body_html: String,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn sink_name(&self) -> &'static str;

    async fn send(&self, notification: &Notification) -> Result<(), NotificationError>;
}

/// Sink that writes the alert to the log instead of delivering it
#[derive(Debug, Default, Clone)]
pub struct LoggingNotificationSink;

#[async_trait]
impl NotificationSink for LoggingNotificationSink {
    fn sink_name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        if notification.recipients.is_empty() {
            return Err(NotificationError::Rejected("no recipients".to_string()));
        }
        crate::log_notification!(info, "Notification logged (not delivered)",
            subject: notification.subject,
            recipients: notification.recipients,
            bcc: notification.bcc,
            body_bytes: notification.body_html.len()
        );
        tracing::debug!(body = %notification.body_html, "Notification body");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(recipients: Vec<String>) -> Notification {
        Notification {
            author: None,
            recipients,
            bcc: Vec::new(),
            reply_to: None,
            subject: "Alert (1)".to_string(),
            body_html: "<table></table>".to_string(),
        }
    }

    #[tokio::test]
    async fn test_logging_sink_requires_recipient() {
        let sink = LoggingNotificationSink;
        assert!(sink
            .send(&notification(vec!["planning@example.com".to_string()]))
            .await
            .is_ok());
        assert!(matches!(
            sink.send(&notification(Vec::new())).await,
            Err(NotificationError::Rejected(_))
        ));
    }
}
