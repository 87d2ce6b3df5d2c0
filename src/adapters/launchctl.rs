use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{AdapterError, LoadedJob, SchedulerAdapter};

/// The real adapter: shells out to `launchctl`. Exit status is the only
/// semantic channel; stdout is parsed for `list` rows and stderr is quoted
/// in error messages for humans, never interpreted.
pub struct LaunchctlAdapter;

impl LaunchctlAdapter {
    async fn run(&self, args: &[&str]) -> Result<(), AdapterError> {
        debug!(args = ?args, "invoking launchctl");
        let output = Command::new("launchctl").args(args).output().await?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(AdapterError::CommandFailed(format!(
            "launchctl {} exited with {}: {}",
            args.first().unwrap_or(&""),
            output.status,
            stderr.trim()
        )))
    }
}

#[async_trait]
impl SchedulerAdapter for LaunchctlAdapter {
    async fn list(&self) -> Result<Vec<LoadedJob>, AdapterError> {
        let output = Command::new("launchctl").arg("list").output().await?;
        if !output.status.success() {
            return Err(AdapterError::CommandFailed(format!(
                "launchctl list exited with {}",
                output.status
            )));
        }
        Ok(parse_list_output(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn load(&self, plist_path: &Path) -> Result<(), AdapterError> {
        self.run(&["load", &plist_path.to_string_lossy()]).await
    }

    async fn unload(&self, plist_path: &Path) -> Result<(), AdapterError> {
        self.run(&["unload", &plist_path.to_string_lossy()]).await
    }

    async fn start(&self, label: &str) -> Result<(), AdapterError> {
        self.run(&["start", label]).await
    }
}

/// Parse `launchctl list` output: tab-separated `PID\tStatus\tLabel` rows
/// with a `-` PID for jobs that are loaded but not running. The header row
/// and anything else that is not a valid row is skipped.
fn parse_list_output(raw: &str) -> Vec<LoadedJob> {
    raw.lines()
        .filter_map(|line| {
            let mut cols = line.split('\t');
            let pid_col = cols.next()?.trim();
            let status_col = cols.next()?.trim();
            let label = cols.next()?.trim();
            if label.is_empty() {
                return None;
            }
            let pid = if pid_col == "-" {
                None
            } else {
                // A non-numeric first column is the header, not a job row.
                Some(pid_col.parse::<i32>().ok()?)
            };
            Some(LoadedJob {
                label: label.to_string(),
                pid,
                last_exit_status: status_col.parse().unwrap_or(0),
            })
        })
        .collect()
}
