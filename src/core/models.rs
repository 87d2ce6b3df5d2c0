use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::core::schedule::Schedule;

/// What we know about a job's most recent run. For launchd jobs this is an
/// inference from log evidence, not a recorded exit code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInfo {
    pub timestamp: DateTime<Local>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Outcome of a user-initiated action (toggle, start, run). Failures carry a
/// short human-readable message instead of raising.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A script job owned by the internal scheduler rather than launchd.
/// Stored in sqlite; the armed timer is runtime-only and always re-derived
/// from this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptJob {
    pub id: String,
    pub name: String,
    pub script: String,
    pub schedule: Schedule,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<RunInfo>,
}

impl ActionResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}
