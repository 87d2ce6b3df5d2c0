//! Heuristic success/failure classification of job log tails.
//!
//! Jobs under launchd give us no completion callback, so the only outcome
//! signal is what the job wrote to its log. [`classify`] scans a bounded
//! tail for known failure and success keywords. This is explicitly
//! best-effort: a log with no matching keyword at all reads as success.

use std::path::Path;

use serde::Serialize;

/// How many trailing lines the keyword scan looks at.
pub const TAIL_WINDOW: usize = 20;

/// How many trailing lines are searched for the diagnostic message line.
const MESSAGE_WINDOW: usize = 10;

/// Maximum diagnostic message length, in characters.
const MAX_MESSAGE_LEN: usize = 100;

/// Failure keywords, checked in order. All matching is lowercase.
const FAILURE_KEYWORDS: &[&str] = &[
    "error",
    "failed",
    "failure",
    "exception",
    "fatal",
    "panic",
    "traceback",
    "command not found",
    "no such file",
    "permission denied",
    "오류",
    "에러",
    "실패",
];

/// Success keywords. Any hit overrides a failure verdict from the same
/// window, so a retried error followed by a completion marker reads as
/// success.
const SUCCESS_KEYWORDS: &[&str] = &[
    "success",
    "succeeded",
    "complete",
    "completed",
    "done",
    "finished",
    "성공",
    "완료",
];

/// The classifier's verdict on a log tail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Classify the given log lines. Only the last [`TAIL_WINDOW`] lines are
/// considered. Empty input is vacuously successful.
pub fn classify(lines: &[String]) -> Verdict {
    let tail = last_n(lines, TAIL_WINDOW);
    let haystack = tail
        .iter()
        .map(|l| l.to_lowercase())
        .collect::<Vec<_>>()
        .join("\n");

    let mut success = true;
    let mut message = None;

    for keyword in FAILURE_KEYWORDS {
        if haystack.contains(keyword) {
            success = false;
            message = last_n(lines, MESSAGE_WINDOW)
                .iter()
                .find(|line| line.to_lowercase().contains(keyword))
                .map(|line| truncate_chars(line.trim(), MAX_MESSAGE_LEN));
            break;
        }
    }

    if SUCCESS_KEYWORDS.iter().any(|k| haystack.contains(k)) {
        success = true;
        message = None;
    }

    Verdict { success, message }
}

/// Read the last `limit` lines of a log file. Unreadable or missing files
/// yield an empty tail; callers treat that the same as an empty log.
pub fn tail_lines(path: &Path, limit: usize) -> Vec<String> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(limit);
    lines[start..].iter().map(|l| l.to_string()).collect()
}

fn last_n(lines: &[String], n: usize) -> &[String] {
    let start = lines.len().saturating_sub(n);
    &lines[start..]
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    s.chars().take(max).collect()
}
