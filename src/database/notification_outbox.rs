//! Notification outbox.
//!
//! The alert is written to `notification_outbox` and picked up by the mail
//! delivery worker, which owns `sent_at`. The insert is the whole contract:
//! once the row exists the notifier considers the alert sent.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::notification::{Notification, NotificationError, NotificationSink};

#[derive(Debug, Clone)]
pub struct PgNotificationOutbox {
    pool: PgPool,
}

impl PgNotificationOutbox {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSink for PgNotificationOutbox {
    fn sink_name(&self) -> &'static str {
        "postgres_outbox"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        if notification.recipients.is_empty() {
            return Err(NotificationError::Rejected("no recipients".to_string()));
        }

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO notification_outbox
                (author, recipients, bcc, reply_to, subject, body_html, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING id
            "#,
        )
        .bind(&notification.author)
        .bind(&notification.recipients)
        .bind(&notification.bcc)
        .bind(&notification.reply_to)
        .bind(&notification.subject)
        .bind(&notification.body_html)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| NotificationError::Transport(e.to_string()))?;

        tracing::debug!(outbox_id = id, subject = %notification.subject, "Notification queued");
        Ok(())
    }
}
