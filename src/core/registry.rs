//! Job registry: reconciles declared LaunchAgent plists against live
//! launchd state.
//!
//! The registry is read-through: every listing re-reads the definition
//! files and re-queries launchd, because both can change behind our back
//! (edited plists, a manual `launchctl unload` in a terminal, a crash).
//! Discovery and the live query each degrade to empty on failure; a broken
//! environment shows an empty or stale list, never an error page.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::warn;

use crate::adapters::SchedulerAdapter;
use crate::config::AppConfig;
use crate::core::classifier::{TAIL_WINDOW, classify, tail_lines};
use crate::core::definition::{self, JobDefinition};
use crate::core::models::{ActionResult, RunInfo};
use crate::core::schedule;

/// A job definition merged with live scheduler state. Computed fresh on
/// every query, never cached.
#[derive(Debug, Clone, Serialize)]
pub struct JobState {
    #[serde(flatten)]
    pub definition: JobDefinition,
    pub schedule_text: String,
    pub is_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<RunInfo>,
}

pub struct JobRegistry {
    config: Arc<AppConfig>,
    adapter: Arc<dyn SchedulerAdapter>,
}

impl JobRegistry {
    pub fn new(config: Arc<AppConfig>, adapter: Arc<dyn SchedulerAdapter>) -> Self {
        Self { config, adapter }
    }

    /// All declared jobs merged with live state, most recent run first.
    /// Jobs that never ran sort last; a job that ran an hour ago is more
    /// interesting than one that never ran at all.
    pub async fn list_all(&self) -> Vec<JobState> {
        let definitions = self.discover();

        let live: HashMap<String, Option<i32>> = match self.adapter.list().await {
            Ok(rows) => rows
                .into_iter()
                .filter(|row| row.label.starts_with(&self.config.label_prefix))
                .map(|row| (row.label, row.pid))
                .collect(),
            Err(e) => {
                warn!(error = %e, "live scheduler query failed, listing jobs as unloaded");
                HashMap::new()
            }
        };

        let mut states: Vec<JobState> = definitions
            .into_iter()
            .map(|def| {
                let is_loaded = live.contains_key(&def.label);
                let pid = live.get(&def.label).copied().flatten();
                let last_run = last_run_from_log(def.log_path.as_deref());
                JobState {
                    schedule_text: schedule::describe(&def.schedule),
                    definition: def,
                    is_loaded,
                    pid,
                    last_run,
                }
            })
            .collect();

        states.sort_by(|a, b| match (&a.last_run, &b.last_run) {
            (Some(x), Some(y)) => y.timestamp.cmp(&x.timestamp),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.definition.label.cmp(&b.definition.label),
        });
        states
    }

    /// Load the job if it is unloaded, unload it if it is loaded.
    /// Loadedness is re-queried at decision time; launchd is the source of
    /// truth and cached state would go stale behind our back.
    pub async fn toggle(&self, label: &str) -> ActionResult {
        let Some(state) = self.find_by_id(label).await else {
            return ActionResult::failure(format!("작업을 찾을 수 없습니다: {label}"));
        };

        let result = if state.is_loaded {
            self.adapter.unload(&state.definition.plist_path).await
        } else {
            self.adapter.load(&state.definition.plist_path).await
        };

        match result {
            Ok(()) => ActionResult::ok(),
            Err(e) => ActionResult::failure(format!("작업 전환에 실패했습니다: {e}")),
        }
    }

    /// Manually start a loaded job. Starting an unloaded job is a defined
    /// user error with its own message, not a raw launchctl failure.
    pub async fn start(&self, label: &str) -> ActionResult {
        let Some(state) = self.find_by_id(label).await else {
            return ActionResult::failure(format!("작업을 찾을 수 없습니다: {label}"));
        };
        if !state.is_loaded {
            return ActionResult::failure("로드되지 않은 작업입니다. 먼저 작업을 켠 뒤 실행하세요.");
        }

        match self.adapter.start(label).await {
            Ok(()) => ActionResult::ok(),
            Err(e) => ActionResult::failure(format!("작업 실행에 실패했습니다: {e}")),
        }
    }

    pub async fn find_by_id(&self, label: &str) -> Option<JobState> {
        self.list_all()
            .await
            .into_iter()
            .find(|state| state.definition.label == label)
    }

    /// Definition files under the agents directory matching the label
    /// prefix convention. Unparseable files are skipped, an unreadable
    /// directory yields an empty listing.
    fn discover(&self) -> Vec<JobDefinition> {
        let dir = &self.config.agents_dir;
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot read agents directory");
                return Vec::new();
            }
        };

        let mut paths: Vec<_> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|name| {
                        name.starts_with(&self.config.label_prefix) && name.ends_with(".plist")
                    })
            })
            .collect();
        paths.sort();

        paths.iter().filter_map(|path| definition::parse(path)).collect()
    }
}

/// Infer the most recent run from log evidence: the file's mtime is the
/// run time, the tail verdict is the outcome. Absent or unreadable logs
/// mean no known run.
fn last_run_from_log(log_path: Option<&Path>) -> Option<RunInfo> {
    let path = log_path?;
    let mtime = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    let verdict = classify(&tail_lines(path, TAIL_WINDOW));
    Some(RunInfo {
        timestamp: DateTime::<Local>::from(mtime),
        success: verdict.success,
        message: verdict.message,
    })
}
