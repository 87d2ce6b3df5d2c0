//! Self-rescheduling timer engine for script jobs.
//!
//! Script jobs are not registered with launchd; this scheduler owns their
//! timing. Each enabled job has exactly one armed one-shot timer whose fire
//! handler runs the script, records the outcome, and arms the next
//! occurrence itself. Timer handles live only in memory: on startup every
//! enabled job is re-armed from its stored definition.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Local;
use tokio::process::Command;
use tokio_rusqlite::Connection;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::models::{ActionResult, RunInfo, ScriptJob};
use crate::core::notifications::NotificationChannel;
use crate::core::schedule::next_occurrence;
use crate::db;

/// Combined stdout/stderr/error text kept per run, in characters.
const MAX_OUTPUT_CHARS: usize = 2000;

#[derive(Clone)]
pub struct ScriptScheduler {
    db: Connection,
    timers: Arc<Mutex<HashMap<String, CancellationToken>>>,
    notifier: Arc<dyn NotificationChannel>,
    script_timeout: Duration,
}

impl ScriptScheduler {
    pub fn new(
        db: Connection,
        notifier: Arc<dyn NotificationChannel>,
        script_timeout: Duration,
    ) -> Self {
        Self {
            db,
            timers: Arc::new(Mutex::new(HashMap::new())),
            notifier,
            script_timeout,
        }
    }

    /// Arm timers for every enabled stored job. Called once at daemon
    /// startup; armed state is never persisted, always re-derived.
    pub async fn start_all(&self) -> anyhow::Result<()> {
        let jobs = db::scripts::list(&self.db).await?;
        let mut armed = 0;
        for job in jobs {
            if job.enabled {
                self.schedule(job);
                armed += 1;
            }
        }
        info!(armed, "script scheduler started");
        Ok(())
    }

    /// Arm the job's next occurrence, replacing any existing timer for the
    /// same id. Schedules that never auto-fire leave nothing armed.
    pub fn schedule(&self, job: ScriptJob) {
        self.cancel(&job.id);

        let Some(delay) = next_occurrence(&job.schedule, Local::now().naive_local()) else {
            debug!(job = %job.name, "schedule never auto-fires, nothing to arm");
            return;
        };

        let token = CancellationToken::new();
        self.timers
            .lock()
            .unwrap()
            .insert(job.id.clone(), token.clone());
        debug!(job = %job.name, delay_secs = delay.as_secs(), "armed script timer");

        let scheduler = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    scheduler.timers.lock().unwrap().remove(&job.id);
                    scheduler.fire(job).await;
                }
            }
        });
    }

    /// Disarm the job's timer. Safe to call when nothing is armed.
    pub fn cancel(&self, id: &str) {
        if let Some(token) = self.timers.lock().unwrap().remove(id) {
            token.cancel();
        }
    }

    /// The one entry point consumers use after create/update/toggle.
    pub fn refresh(&self, job: &ScriptJob) {
        if job.enabled {
            self.schedule(job.clone());
        } else {
            self.cancel(&job.id);
        }
    }

    /// Run a job immediately, outside its schedule. Does not touch the
    /// armed timer.
    pub async fn run_now(&self, id: &str) -> ActionResult {
        let job = match db::scripts::get(&self.db, id.to_string()).await {
            Ok(Some(job)) => job,
            Ok(None) => return ActionResult::failure("스크립트를 찾을 수 없습니다."),
            Err(e) => return ActionResult::failure(format!("스크립트를 불러오지 못했습니다: {e}")),
        };

        let run = self.execute(&job.script).await;
        self.record_and_notify(&job, &run).await;
        if run.success {
            ActionResult::ok()
        } else {
            ActionResult::failure(run.message.unwrap_or_else(|| "스크립트가 실패했습니다.".to_string()))
        }
    }

    pub fn armed(&self, id: &str) -> bool {
        self.timers.lock().unwrap().contains_key(id)
    }

    pub fn armed_count(&self) -> usize {
        self.timers.lock().unwrap().len()
    }

    async fn fire(&self, job: ScriptJob) {
        info!(job = %job.name, "running scheduled script");
        let run = self.execute(&job.script).await;
        self.record_and_notify(&job, &run).await;

        // The job may have been disabled or deleted while the script ran;
        // only a still-enabled current definition re-arms.
        match db::scripts::get(&self.db, job.id.clone()).await {
            Ok(Some(current)) if current.enabled => self.schedule(current),
            Ok(_) => debug!(job = %job.name, "job disabled or removed, not rescheduling"),
            Err(e) => warn!(job = %job.name, error = %e, "could not re-read job after run"),
        }
    }

    async fn record_and_notify(&self, job: &ScriptJob, run: &RunInfo) {
        if let Err(e) = db::scripts::record_run(&self.db, job.id.clone(), run.clone()).await {
            warn!(job = %job.name, error = %e, "failed to record script run");
        }
        let body = run.message.clone().unwrap_or_else(|| {
            if run.success {
                "스크립트가 완료되었습니다.".to_string()
            } else {
                "스크립트가 실패했습니다.".to_string()
            }
        });
        if let Err(e) = self.notifier.notify(&job.name, &body, run.success).await {
            warn!(job = %job.name, error = %e, "failed to dispatch notification");
        }
    }

    /// Run the script under `/bin/sh -c` with a hard deadline. A hung
    /// script is abandoned from our bookkeeping even if the OS process
    /// lingers; `kill_on_drop` reaps it when the future is dropped.
    async fn execute(&self, script: &str) -> RunInfo {
        let timestamp = Local::now();
        let result = tokio::time::timeout(
            self.script_timeout,
            Command::new("/bin/sh")
                .arg("-c")
                .arg(script)
                .kill_on_drop(true)
                .output(),
        )
        .await;

        match result {
            Err(_) => {
                warn!(timeout_secs = self.script_timeout.as_secs(), "script timed out");
                RunInfo {
                    timestamp,
                    success: false,
                    message: Some(format!(
                        "시간 초과: {}초 안에 끝나지 않았습니다.",
                        self.script_timeout.as_secs()
                    )),
                }
            }
            Ok(Err(e)) => RunInfo {
                timestamp,
                success: false,
                message: Some(truncate_output(&format!("실행 실패: {e}"))),
            },
            Ok(Ok(output)) => {
                let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stderr.trim().is_empty() {
                    if !combined.is_empty() {
                        combined.push('\n');
                    }
                    combined.push_str(stderr.trim_end());
                }
                let combined = combined.trim().to_string();
                RunInfo {
                    timestamp,
                    success: output.status.success(),
                    message: (!combined.is_empty()).then(|| truncate_output(&combined)),
                }
            }
        }
    }
}

fn truncate_output(s: &str) -> String {
    if s.chars().count() <= MAX_OUTPUT_CHARS {
        return s.to_string();
    }
    s.chars().take(MAX_OUTPUT_CHARS).collect()
}
