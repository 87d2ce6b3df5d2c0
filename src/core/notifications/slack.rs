use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use super::NotificationChannel;

pub struct SlackNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NotificationChannel for SlackNotifier {
    async fn notify(&self, title: &str, body: &str, success: bool) -> Result<()> {
        let color = if success { "#2eb886" } else { "#cc0000" };
        let payload = json!({
            "attachments": [{
                "color": color,
                "title": title,
                "text": body,
            }]
        });

        self.client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
