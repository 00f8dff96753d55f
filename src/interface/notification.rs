use crate::model::notification::Notification;
use async_trait::async_trait;
use tracing::{info, warn};

/// Delivery is an external collaborator; the engine only hands over the
/// payload and never waits on user-facing side effects.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification);
}

/// Default sink: structured log lines only.
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn notify(&self, notification: Notification) {
        match notification.kind {
            crate::model::notification::NotificationKind::BackupCompleted => {
                info!(title = %notification.title, "{}", notification.message)
            }
            _ => warn!(title = %notification.title, "{}", notification.message),
        }
    }
}
