//! Capability interface over the OS job scheduler.
//!
//! launchd is the single source of truth for which jobs are loaded, and the
//! only way to observe it is by invoking `launchctl`. Everything the rest of
//! the daemon needs from it goes through [`SchedulerAdapter`] so tests and
//! `--simulation` mode can swap in the in-memory twin.

mod launchctl;
mod simulated;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use launchctl::LaunchctlAdapter;
pub use simulated::SimulatedAdapter;

/// One row of live scheduler state: a loaded job and its PID, if running.
#[derive(Debug, Clone)]
pub struct LoadedJob {
    pub label: String,
    pub pid: Option<i32>,
    pub last_exit_status: i32,
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("scheduler command failed: {0}")]
    CommandFailed(String),
    #[error("failed to invoke scheduler command: {0}")]
    Io(#[from] std::io::Error),
}

/// Commands and queries against the OS scheduler. Results are never cached;
/// launchd state can change behind our back at any time.
#[async_trait]
pub trait SchedulerAdapter: Send + Sync {
    /// List all currently loaded jobs.
    async fn list(&self) -> Result<Vec<LoadedJob>, AdapterError>;

    /// Load the job defined by the given plist file.
    async fn load(&self, plist_path: &Path) -> Result<(), AdapterError>;

    /// Unload the job defined by the given plist file.
    async fn unload(&self, plist_path: &Path) -> Result<(), AdapterError>;

    /// Manually start a loaded job by label.
    async fn start(&self, label: &str) -> Result<(), AdapterError>;
}

pub fn get_adapter(simulation: bool) -> Arc<dyn SchedulerAdapter> {
    if simulation {
        Arc::new(SimulatedAdapter::new())
    } else {
        Arc::new(LaunchctlAdapter)
    }
}
