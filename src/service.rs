use crate::config::AppConfig;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::process::Command;

const AGENT_LABEL: &str = "com.jobsd.daemon";

const AGENT_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>com.jobsd.daemon</string>
    <key>ProgramArguments</key>
    <array>
        <string>{binary_path}</string>
        <string>daemon</string>
    </array>
    <key>KeepAlive</key>
    <true/>
    <key>RunAtLoad</key>
    <true/>
    <key>StandardOutPath</key>
    <string>{log_path}</string>
    <key>StandardErrorPath</key>
    <string>{log_path}</string>
</dict>
</plist>
"#;

/// Installs jobsd itself as a LaunchAgent so it survives logout/login.
pub struct ServiceManager {
    agent_path: PathBuf,
    config_path: PathBuf,
    log_path: PathBuf,
}

impl Default for ServiceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceManager {
    pub fn new() -> Self {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            agent_path: home.join(format!("Library/LaunchAgents/{AGENT_LABEL}.plist")),
            config_path: AppConfig::config_file(),
            log_path: home.join("Library/Logs/jobsd.log"),
        }
    }

    pub fn is_installed(&self) -> bool {
        self.agent_path.exists()
    }

    pub fn install_and_start(&self, config: &AppConfig) -> Result<()> {
        self.write_config(config)?;
        self.write_agent_plist()?;
        launchctl(&["load", &self.agent_path.to_string_lossy()])?;
        Ok(())
    }

    pub fn uninstall(&self) -> Result<()> {
        // Unload may fail when the agent was never loaded; removal of the
        // plist is what actually uninstalls.
        let _ = launchctl(&["unload", &self.agent_path.to_string_lossy()]);
        if self.agent_path.exists() {
            std::fs::remove_file(&self.agent_path).context("Failed to remove agent plist")?;
        }
        Ok(())
    }

    fn write_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(dir) = self.config_path.parent() {
            std::fs::create_dir_all(dir).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
        std::fs::write(&self.config_path, content).context("Failed to write config file")?;
        Ok(())
    }

    fn write_agent_plist(&self) -> Result<()> {
        let binary_path = std::env::current_exe().context("Failed to determine binary path")?;
        if let Some(dir) = self.agent_path.parent() {
            std::fs::create_dir_all(dir).context("Failed to create LaunchAgents directory")?;
        }

        let content = AGENT_TEMPLATE
            .replace("{binary_path}", &binary_path.display().to_string())
            .replace("{log_path}", &self.log_path.display().to_string());

        std::fs::write(&self.agent_path, content).context("Failed to write agent plist")?;
        Ok(())
    }
}

fn launchctl(args: &[&str]) -> Result<()> {
    let status = Command::new("launchctl")
        .args(args)
        .status()
        .with_context(|| format!("Failed to run launchctl {}", args.join(" ")))?;

    if !status.success() {
        anyhow::bail!("launchctl {} failed with {}", args.join(" "), status);
    }
    Ok(())
}
