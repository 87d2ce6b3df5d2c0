use anyhow::{Result, bail};
use async_trait::async_trait;
use tokio::process::Command;

use super::NotificationChannel;

/// macOS notification center, driven through `osascript`.
pub struct DesktopNotifier;

fn osa_quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

#[async_trait]
impl NotificationChannel for DesktopNotifier {
    async fn notify(&self, title: &str, body: &str, success: bool) -> Result<()> {
        let marker = if success { "✅" } else { "⚠️" };
        let script = format!(
            "display notification {} with title {}",
            osa_quote(body),
            osa_quote(&format!("{marker} {title}"))
        );

        let status = Command::new("osascript")
            .arg("-e")
            .arg(&script)
            .status()
            .await?;
        if !status.success() {
            bail!("osascript exited with {}", status);
        }
        Ok(())
    }
}
