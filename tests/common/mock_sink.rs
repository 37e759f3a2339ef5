//! Recording notification sink for integration tests

use assembly_notifier::notification::{Notification, NotificationError, NotificationSink};
use async_trait::async_trait;
use parking_lot::Mutex;

/// Records every notification it is handed; can be switched to fail
#[derive(Debug, Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<Notification>>,
    failure: Mutex<Option<String>>,
    attempts: Mutex<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(reason: &str) -> Self {
        let sink = Self::default();
        sink.fail_with(reason);
        sink
    }

    pub fn fail_with(&self, reason: &str) {
        *self.failure.lock() = Some(reason.to_string());
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    fn sink_name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        *self.attempts.lock() += 1;
        if let Some(reason) = self.failure.lock().clone() {
            return Err(NotificationError::Transport(reason));
        }
        self.sent.lock().push(notification.clone());
        Ok(())
    }
}
