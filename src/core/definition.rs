//! LaunchAgent plist parsing.
//!
//! Turns one definition file into a normalized [`JobDefinition`]. Any
//! unreadable or malformed file yields `None` so discovery can skip it and
//! keep going; a single broken plist must never abort a listing.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::core::schedule::Schedule;

/// How many leading script lines the metadata scan reads.
const METADATA_SCAN_LINES: usize = 10;

/// Interpreters whose first ProgramArguments element is not the job's own
/// command.
const INTERPRETERS: &[&str] = &[
    "sh", "bash", "zsh", "dash", "osascript", "python", "python3", "ruby", "perl", "node",
];

/// A normalized job definition, parsed fresh from its plist on every
/// listing. Identity is the label.
#[derive(Debug, Clone, Serialize)]
pub struct JobDefinition {
    pub label: String,
    pub plist_path: PathBuf,
    pub command_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
    pub schedule: Schedule,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Parse a LaunchAgent plist into a [`JobDefinition`].
pub fn parse(path: &Path) -> Option<JobDefinition> {
    let root = match plist::Value::from_file(path) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping unparseable job definition");
            return None;
        }
    };
    let Some(dict) = root.as_dictionary() else {
        warn!(path = %path.display(), "job definition root is not a dictionary");
        return None;
    };

    let label = dict
        .get("Label")
        .and_then(|v| v.as_string())
        .unwrap_or("unknown")
        .to_string();

    let program_arguments: Vec<String> = dict
        .get("ProgramArguments")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_string().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    let command_path = command_path(&program_arguments);

    let log_path = dict
        .get("StandardOutPath")
        .or_else(|| dict.get("StandardErrorPath"))
        .and_then(|v| v.as_string())
        .map(PathBuf::from);

    let schedule = extract_schedule(dict);

    let metadata = scan_script_metadata(Path::new(&command_path));
    let display_name = metadata
        .name
        .clone()
        .unwrap_or_else(|| default_display_name(&label));

    debug!(label = %label, path = %path.display(), "parsed job definition");

    Some(JobDefinition {
        label,
        plist_path: path.to_path_buf(),
        command_path,
        log_path,
        schedule,
        display_name,
        icon: metadata.icon,
        description: metadata.description,
    })
}

/// The job's own command from its invocation array: the element after a
/// leading interpreter, otherwise the last element.
fn command_path(args: &[String]) -> String {
    match args.first() {
        None => String::new(),
        Some(first) if is_interpreter(first) => args.get(1).cloned().unwrap_or_default(),
        Some(_) => args.last().cloned().unwrap_or_default(),
    }
}

fn is_interpreter(path: &str) -> bool {
    let name = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path);
    INTERPRETERS.contains(&name)
}

/// Trigger fields in priority order: calendar interval, fixed interval,
/// keep-alive. First present field wins; none present is the explicit
/// `Unknown` schedule so downstream formatting always has a case.
fn extract_schedule(dict: &plist::Dictionary) -> Schedule {
    if let Some(value) = dict.get("StartCalendarInterval") {
        return calendar_schedule(value);
    }
    if let Some(secs) = dict.get("StartInterval").and_then(|v| v.as_signed_integer()) {
        if secs > 0 {
            return Schedule::Interval { secs: secs as u64 };
        }
    }
    if let Some(value) = dict.get("KeepAlive") {
        let active = match value {
            plist::Value::Boolean(b) => *b,
            plist::Value::Dictionary(_) => true,
            _ => false,
        };
        if active {
            return Schedule::KeepAlive;
        }
    }
    Schedule::Unknown
}

fn calendar_schedule(value: &plist::Value) -> Schedule {
    let entries: Vec<&plist::Dictionary> = match value {
        plist::Value::Array(items) => items.iter().filter_map(|v| v.as_dictionary()).collect(),
        plist::Value::Dictionary(dict) => vec![dict],
        _ => Vec::new(),
    };

    let mut weekdays = BTreeSet::new();
    let mut hour = None;
    let mut minute = None;
    for entry in &entries {
        if let Some(day) = int_in_range(entry.get("Weekday"), 0, 6) {
            weekdays.insert(day as u8);
        }
        if hour.is_none() {
            hour = int_in_range(entry.get("Hour"), 0, 23).map(|v| v as u8);
        }
        if minute.is_none() {
            minute = int_in_range(entry.get("Minute"), 0, 59).map(|v| v as u8);
        }
    }

    Schedule::Calendar {
        weekdays: (!weekdays.is_empty()).then_some(weekdays),
        hour,
        minute,
    }
}

/// Out-of-range values from external files are treated as absent, never
/// clamped.
fn int_in_range(value: Option<&plist::Value>, lo: i64, hi: i64) -> Option<i64> {
    let n = value?.as_signed_integer()?;
    (lo..=hi).contains(&n).then_some(n)
}

fn default_display_name(label: &str) -> String {
    label.rsplit('.').next().unwrap_or(label).to_string()
}

#[derive(Default)]
struct ScriptMetadata {
    name: Option<String>,
    icon: Option<String>,
    description: Option<String>,
}

/// Best-effort scan of the target script's first lines for `# @job:` and
/// `# @desc:` markers. Read failure yields empty metadata, never an error.
fn scan_script_metadata(script_path: &Path) -> ScriptMetadata {
    let Ok(content) = std::fs::read_to_string(script_path) else {
        return ScriptMetadata::default();
    };

    let marker = Regex::new(r"^#\s*@(job|desc):\s*(.+)$").unwrap();
    let mut metadata = ScriptMetadata::default();
    for line in content.lines().take(METADATA_SCAN_LINES) {
        let Some(caps) = marker.captures(line.trim_end()) else {
            continue;
        };
        let value = caps[2].trim();
        match &caps[1] {
            "job" if metadata.name.is_none() => {
                let (icon, name) = split_icon(value);
                metadata.icon = icon;
                metadata.name = Some(name);
            }
            "desc" if metadata.description.is_none() => {
                metadata.description = Some(value.to_string());
            }
            _ => {}
        }
    }
    metadata
}

/// A leading symbol token (an emoji, usually) in the name marker is the
/// job's icon. Letters and digits in any script stay part of the name.
fn split_icon(value: &str) -> (Option<String>, String) {
    let mut parts = value.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("").trim();
    let symbolic = !first.is_empty()
        && first
            .chars()
            .all(|c| !c.is_alphanumeric() && !c.is_ascii_punctuation());
    if symbolic && !rest.is_empty() {
        (Some(first.to_string()), rest.to_string())
    } else {
        (None, value.to_string())
    }
}
