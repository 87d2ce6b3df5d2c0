//! Completion detection for launchd jobs we started.
//!
//! launchd gives no exit callback, so the only completion evidence is the
//! job's log file gaining a newer mtime than it had when we kicked the job
//! off. One shared poller watches every active entry; it starts lazily on
//! the first registration and stops once nothing is being watched. A job
//! that never writes within the timeout is dropped silently: no output is
//! non-observability, not evidence of failure.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant, SystemTime};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::classifier::{TAIL_WINDOW, classify, tail_lines};
use crate::core::notifications::NotificationChannel;

struct MonitoringEntry {
    display_name: String,
    log_path: PathBuf,
    started_at: Instant,
    initial_mtime: Option<SystemTime>,
}

/// Watches log files of started jobs and dispatches one notification per
/// detected completion. Per-instance state; instances do not interfere.
#[derive(Clone)]
pub struct CompletionMonitor {
    entries: Arc<Mutex<HashMap<String, MonitoringEntry>>>,
    notifier: Arc<dyn NotificationChannel>,
    poll_interval: Duration,
    timeout: Duration,
    poller: Arc<StdMutex<Option<JoinHandle<()>>>>,
}

impl CompletionMonitor {
    pub fn new(
        notifier: Arc<dyn NotificationChannel>,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            notifier,
            poll_interval,
            timeout,
            poller: Arc::new(StdMutex::new(None)),
        }
    }

    /// Begin watching a job we just started. The current log mtime is the
    /// baseline; `None` when the log does not exist yet, in which case the
    /// file merely appearing counts as completion evidence. Re-arming a
    /// label replaces its previous entry, monitors never stack.
    pub async fn start_monitoring(&self, label: &str, display_name: &str, log_path: &Path) {
        let entry = MonitoringEntry {
            display_name: display_name.to_string(),
            log_path: log_path.to_path_buf(),
            started_at: Instant::now(),
            initial_mtime: log_mtime(log_path),
        };
        self.entries.lock().await.insert(label.to_string(), entry);
        debug!(label = %label, log = %log_path.display(), "monitoring for completion");
        self.ensure_poller();
    }

    /// Number of jobs currently being watched.
    pub async fn active_count(&self) -> usize {
        self.entries.lock().await.len()
    }

    fn ensure_poller(&self) {
        let mut slot = self.poller.lock().unwrap();
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let monitor = self.clone();
        *slot = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(monitor.poll_interval).await;
                if monitor.poll_once().await == 0 {
                    break;
                }
            }
            debug!("completion poller idle, stopping");
        }));
    }

    /// One poll pass over all entries. Returns how many remain.
    async fn poll_once(&self) -> usize {
        let snapshot: Vec<(String, PathBuf, Instant, Option<SystemTime>)> = {
            let entries = self.entries.lock().await;
            entries
                .iter()
                .map(|(label, e)| {
                    (
                        label.clone(),
                        e.log_path.clone(),
                        e.started_at,
                        e.initial_mtime,
                    )
                })
                .collect()
        };

        for (label, log_path, started_at, initial_mtime) in snapshot {
            if started_at.elapsed() > self.timeout {
                debug!(label = %label, "completion monitor timed out, giving up silently");
                self.entries.lock().await.remove(&label);
                continue;
            }

            let completed = match (initial_mtime, log_mtime(&log_path)) {
                (None, Some(_)) => true,
                (Some(before), Some(now)) => now > before,
                _ => false,
            };
            if !completed {
                continue;
            }

            let Some(entry) = self.entries.lock().await.remove(&label) else {
                continue;
            };

            let verdict = classify(&tail_lines(&log_path, TAIL_WINDOW));
            let body = verdict.message.clone().unwrap_or_else(|| {
                if verdict.success {
                    "작업이 완료되었습니다.".to_string()
                } else {
                    "작업이 실패했습니다.".to_string()
                }
            });
            info!(label = %label, success = verdict.success, "job completion detected");
            if let Err(e) = self
                .notifier
                .notify(&entry.display_name, &body, verdict.success)
                .await
            {
                warn!(label = %label, error = %e, "failed to dispatch notification");
            }
        }

        self.entries.lock().await.len()
    }
}

fn log_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
