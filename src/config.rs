use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannelType {
    None,
    #[default]
    Desktop,
    Slack,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub channel: NotificationChannelType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slack_webhook: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding the LaunchAgent plists this daemon supervises.
    pub agents_dir: PathBuf,
    /// Only jobs whose label (and plist filename) carry this prefix are ours.
    pub label_prefix: String,
    pub db_path: String,
    pub rpc_bind: SocketAddr,
    pub poll_interval_secs: u64,
    pub monitor_timeout_secs: u64,
    pub script_timeout_secs: u64,
    pub simulation: bool,
    pub verbose: bool,
    pub json_logs: bool,
    pub notifications: NotificationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            agents_dir: home_dir().join("Library/LaunchAgents"),
            label_prefix: "com.jobsd.".to_string(),
            db_path: "jobsd.db".to_string(),
            rpc_bind: SocketAddr::from(([127, 0, 0, 1], 7878)),
            poll_interval_secs: 3,
            monitor_timeout_secs: 300,
            script_timeout_secs: 60,
            simulation: false,
            verbose: false,
            json_logs: false,
            notifications: NotificationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Layered configuration: built-in defaults, then the config file,
    /// then `JOBSD_` environment variables, then explicit CLI flags.
    pub fn new<A: Serialize>(cli: Option<&A>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(Self::config_file()))
            .merge(Env::prefixed("JOBSD_").split("__"));
        if let Some(args) = cli {
            figment = figment.merge(Serialized::defaults(args));
        }
        Ok(figment.extract()?)
    }

    pub fn config_file() -> PathBuf {
        home_dir().join(".config/jobsd/config.toml")
    }

    pub fn monitor_poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn monitor_timeout(&self) -> Duration {
        Duration::from_secs(self.monitor_timeout_secs)
    }

    pub fn script_timeout(&self) -> Duration {
        Duration::from_secs(self.script_timeout_secs)
    }
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_survive_the_figment_round_trip() {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .extract()
            .unwrap();
        assert_eq!(config.label_prefix, "com.jobsd.");
        assert_eq!(config.script_timeout(), Duration::from_secs(60));
        assert!(!config.simulation);
    }

    #[test]
    fn cli_layer_overrides_defaults() {
        #[derive(Serialize)]
        struct Args {
            simulation: bool,
            label_prefix: &'static str,
        }

        let args = Args {
            simulation: true,
            label_prefix: "com.example.",
        };
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Serialized::defaults(&args))
            .extract()
            .unwrap();
        assert!(config.simulation);
        assert_eq!(config.label_prefix, "com.example.");
    }
}
