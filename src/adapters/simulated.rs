use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{AdapterError, LoadedJob, SchedulerAdapter};

#[derive(Default)]
struct SimState {
    loaded: HashMap<String, Option<i32>>,
    started: Vec<String>,
    failures: VecDeque<String>,
}

/// In-memory stand-in for launchd. Used by `--simulation` mode and by
/// tests; the extra methods let tests seed live state and inject command
/// failures without a real `launchctl`.
#[derive(Clone, Default)]
pub struct SimulatedAdapter {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a job as already loaded, as if something outside this process
    /// had loaded it.
    pub fn preload(&self, label: &str, pid: Option<i32>) {
        self.state
            .lock()
            .unwrap()
            .loaded
            .insert(label.to_string(), pid);
    }

    /// Queue a command failure; each queued message fails exactly one
    /// subsequent command, in order.
    pub fn fail_next(&self, message: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .push_back(message.to_string());
    }

    /// Labels that have been manually started, in order.
    pub fn started(&self) -> Vec<String> {
        self.state.lock().unwrap().started.clone()
    }

    pub fn is_loaded(&self, label: &str) -> bool {
        self.state.lock().unwrap().loaded.contains_key(label)
    }

    fn take_failure(&self) -> Option<AdapterError> {
        self.state
            .lock()
            .unwrap()
            .failures
            .pop_front()
            .map(AdapterError::CommandFailed)
    }
}

fn label_from_plist(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[async_trait]
impl SchedulerAdapter for SimulatedAdapter {
    async fn list(&self) -> Result<Vec<LoadedJob>, AdapterError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        let state = self.state.lock().unwrap();
        Ok(state
            .loaded
            .iter()
            .map(|(label, pid)| LoadedJob {
                label: label.clone(),
                pid: *pid,
                last_exit_status: 0,
            })
            .collect())
    }

    async fn load(&self, plist_path: &Path) -> Result<(), AdapterError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        let label = label_from_plist(plist_path);
        self.state.lock().unwrap().loaded.insert(label, None);
        Ok(())
    }

    async fn unload(&self, plist_path: &Path) -> Result<(), AdapterError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        let label = label_from_plist(plist_path);
        self.state.lock().unwrap().loaded.remove(&label);
        Ok(())
    }

    async fn start(&self, label: &str) -> Result<(), AdapterError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        let mut state = self.state.lock().unwrap();
        if !state.loaded.contains_key(label) {
            return Err(AdapterError::CommandFailed(format!(
                "no such loaded job: {label}"
            )));
        }
        state.started.push(label.to_string());
        Ok(())
    }
}
