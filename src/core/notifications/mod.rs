mod desktop;
mod slack;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{NotificationChannelType, NotificationConfig};

pub use desktop::DesktopNotifier;
pub use slack::SlackNotifier;

/// Fire-and-forget delivery of a job outcome to the user. Implementations
/// may fail; callers log and move on, a notification error must never
/// propagate into the monitor or scheduler loops.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn notify(&self, title: &str, body: &str, success: bool) -> Result<()>;
}

/// Swallows everything. Used when notifications are turned off, so callers
/// never need to branch on "is there a notifier".
pub struct NullNotifier;

#[async_trait]
impl NotificationChannel for NullNotifier {
    async fn notify(&self, _title: &str, _body: &str, _success: bool) -> Result<()> {
        Ok(())
    }
}

/// Factory function to create a notifier based on config.
pub fn create_notifier(config: &NotificationConfig) -> Arc<dyn NotificationChannel> {
    match config.channel {
        NotificationChannelType::None => Arc::new(NullNotifier),
        NotificationChannelType::Desktop => Arc::new(DesktopNotifier),
        NotificationChannelType::Slack => match config.slack_webhook.as_deref() {
            Some(webhook) if !webhook.is_empty() => {
                Arc::new(SlackNotifier::new(webhook.to_string()))
            }
            _ => Arc::new(NullNotifier),
        },
    }
}
