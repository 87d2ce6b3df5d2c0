//! Schedule model: when a job fires and how that is shown to the user.
//!
//! [`Schedule`] covers both launchd-declared timing (calendar intervals,
//! fixed intervals, keep-alive) and the timing of internally scheduled
//! script jobs (daily, weekly, interval, manual). [`next_occurrence`] and
//! [`describe`] are pure; callers inject `now` so behavior is fully
//! deterministic under test.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Weekday display names, indexed 0 (Sunday) through 6 (Saturday).
const WEEKDAY_NAMES: [&str; 7] = ["일", "월", "화", "수", "목", "금", "토"];

/// When a job runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Schedule {
    /// Wall-clock schedule owned by launchd. Absent weekdays means every
    /// day; absent hour means launchd decides the time of day and we only
    /// know the weekday pattern.
    Calendar {
        weekdays: Option<BTreeSet<u8>>,
        hour: Option<u8>,
        minute: Option<u8>,
    },
    /// Every N seconds from the last fire.
    Interval { secs: u64 },
    /// launchd keeps the process running continuously.
    KeepAlive,
    /// Script job, once a day at hour:minute.
    Daily { hour: u8, minute: u8 },
    /// Script job, once a week. Weekday is 0 (Sunday) through 6 (Saturday).
    Weekly { weekday: u8, hour: u8, minute: u8 },
    /// Script job that only runs when triggered by hand.
    Manual,
    /// The definition declared no recognizable trigger.
    Unknown,
}

/// Compute how long until the schedule next fires, relative to `now`.
///
/// Returns `None` for schedules that never auto-fire (`Manual`, `Unknown`)
/// and for schedules whose timing launchd owns (`Calendar`, `KeepAlive`).
/// The returned instant is always strictly in the future: a daily schedule
/// whose time already passed today lands tomorrow, and a weekly schedule
/// whose time already passed on its own weekday lands a full week out,
/// never 0 days.
pub fn next_occurrence(schedule: &Schedule, now: NaiveDateTime) -> Option<Duration> {
    match schedule {
        Schedule::Interval { secs } => Some(Duration::from_secs(*secs)),
        Schedule::Daily { hour, minute } => {
            let mut target = now.date().and_hms_opt(u32::from(*hour), u32::from(*minute), 0)?;
            if target <= now {
                target += chrono::Duration::days(1);
            }
            (target - now).to_std().ok()
        }
        Schedule::Weekly {
            weekday,
            hour,
            minute,
        } => {
            let today = i64::from(now.weekday().num_days_from_sunday());
            let days_ahead = (i64::from(*weekday) - today).rem_euclid(7);
            let mut target = (now.date() + chrono::Duration::days(days_ahead))
                .and_hms_opt(u32::from(*hour), u32::from(*minute), 0)?;
            if days_ahead == 0 && target <= now {
                target += chrono::Duration::days(7);
            }
            (target - now).to_std().ok()
        }
        Schedule::Calendar { .. } | Schedule::KeepAlive | Schedule::Manual | Schedule::Unknown => {
            None
        }
    }
}

/// Render the schedule as the short Korean phrase shown in job listings
/// and notifications.
pub fn describe(schedule: &Schedule) -> String {
    match schedule {
        Schedule::Calendar {
            weekdays,
            hour,
            minute,
        } => {
            let days = describe_weekdays(weekdays.as_ref());
            match hour {
                Some(h) => format!("{} {:02}:{:02}", days, h, minute.unwrap_or(0)),
                None => days,
            }
        }
        Schedule::Interval { secs } => describe_interval(*secs),
        Schedule::KeepAlive => "상시 실행".to_string(),
        Schedule::Daily { hour, minute } => format!("매일 {:02}:{:02}", hour, minute),
        Schedule::Weekly {
            weekday,
            hour,
            minute,
        } => {
            let day = WEEKDAY_NAMES
                .get(usize::from(*weekday))
                .copied()
                .unwrap_or("?");
            format!("매주 {}요일 {:02}:{:02}", day, hour, minute)
        }
        Schedule::Manual => "수동 실행".to_string(),
        Schedule::Unknown => "알 수 없음".to_string(),
    }
}

fn describe_weekdays(weekdays: Option<&BTreeSet<u8>>) -> String {
    let Some(days) = weekdays else {
        return "매일".to_string();
    };
    if days.len() >= 7 {
        return "매일".to_string();
    }

    let weekday_set: BTreeSet<u8> = (1..=5).collect();
    if *days == weekday_set {
        return "평일".to_string();
    }

    days.iter()
        .filter_map(|d| WEEKDAY_NAMES.get(usize::from(*d)).copied())
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_interval(secs: u64) -> String {
    if secs >= 3600 && secs % 3600 == 0 {
        format!("{}시간마다", secs / 3600)
    } else if secs >= 60 && secs % 60 == 0 {
        format!("{}분마다", secs / 60)
    } else {
        format!("{}초마다", secs)
    }
}
