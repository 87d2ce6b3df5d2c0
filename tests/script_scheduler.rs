use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio_rusqlite::Connection;

use jobsd::core::ScriptScheduler;
use jobsd::core::models::ScriptJob;
use jobsd::core::notifications::NotificationChannel;
use jobsd::core::schedule::Schedule;
use jobsd::db;

#[derive(Default)]
struct CountingNotifier {
    events: Mutex<Vec<(String, bool)>>,
}

impl CountingNotifier {
    fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationChannel for CountingNotifier {
    async fn notify(&self, title: &str, _body: &str, success: bool) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push((title.to_string(), success));
        Ok(())
    }
}

async fn setup(script_timeout: Duration) -> (Connection, ScriptScheduler, Arc<CountingNotifier>) {
    let conn = db::init(":memory:").await.unwrap();
    let notifier = Arc::new(CountingNotifier::default());
    let scheduler = ScriptScheduler::new(conn.clone(), notifier.clone(), script_timeout);
    (conn, scheduler, notifier)
}

fn job(id: &str, schedule: Schedule, script: &str) -> ScriptJob {
    ScriptJob {
        id: id.to_string(),
        name: format!("job-{id}"),
        script: script.to_string(),
        schedule,
        enabled: true,
        last_run: None,
    }
}

#[tokio::test]
async fn interval_job_self_renews_after_each_fire() {
    let (conn, scheduler, notifier) = setup(Duration::from_secs(5)).await;
    let j = job("tick", Schedule::Interval { secs: 1 }, "echo ok");
    db::scripts::create(&conn, j.clone()).await.unwrap();

    scheduler.schedule(j);
    assert!(scheduler.armed("tick"));

    tokio::time::sleep(Duration::from_millis(1600)).await;
    assert_eq!(notifier.count(), 1);
    assert!(scheduler.armed("tick"), "job must re-arm after first fire");

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(notifier.count(), 2);
    assert!(scheduler.armed("tick"), "job must re-arm after second fire");
}

#[tokio::test]
async fn disabling_between_fires_prevents_the_next_fire() {
    let (conn, scheduler, notifier) = setup(Duration::from_secs(5)).await;
    let j = job("fade", Schedule::Interval { secs: 1 }, "echo ok");
    db::scripts::create(&conn, j.clone()).await.unwrap();

    scheduler.schedule(j);
    // Disable in the store without touching the armed timer: the already
    // armed fire still runs, but the post-run enabled re-check must stop
    // the chain there.
    db::scripts::set_enabled(&conn, "fade".to_string(), false)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1600)).await;
    assert_eq!(notifier.count(), 1);
    assert!(!scheduler.armed("fade"));

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(notifier.count(), 1, "no further fires after disable");
}

#[tokio::test]
async fn deleting_between_fires_also_stops_the_chain() {
    let (conn, scheduler, notifier) = setup(Duration::from_secs(5)).await;
    let j = job("gone", Schedule::Interval { secs: 1 }, "echo ok");
    db::scripts::create(&conn, j.clone()).await.unwrap();

    scheduler.schedule(j);
    db::scripts::delete(&conn, "gone".to_string()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(1600)).await;
    assert_eq!(notifier.count(), 1);
    assert!(!scheduler.armed("gone"));
}

#[tokio::test]
async fn manual_schedule_never_arms() {
    let (_conn, scheduler, _notifier) = setup(Duration::from_secs(5)).await;
    scheduler.schedule(job("manual", Schedule::Manual, "echo never"));
    assert!(!scheduler.armed("manual"));
}

#[tokio::test]
async fn cancel_is_idempotent() {
    let (_conn, scheduler, _notifier) = setup(Duration::from_secs(5)).await;
    scheduler.schedule(job("c", Schedule::Interval { secs: 3600 }, "echo hi"));

    scheduler.cancel("c");
    scheduler.cancel("c");
    scheduler.cancel("never-armed");
    assert!(!scheduler.armed("c"));
}

#[tokio::test]
async fn rescheduling_replaces_the_existing_timer() {
    let (_conn, scheduler, _notifier) = setup(Duration::from_secs(5)).await;
    scheduler.schedule(job("dup", Schedule::Interval { secs: 3600 }, "echo a"));
    scheduler.schedule(job("dup", Schedule::Interval { secs: 3600 }, "echo b"));
    assert_eq!(scheduler.armed_count(), 1);
}

#[tokio::test]
async fn refresh_disarms_a_disabled_job() {
    let (_conn, scheduler, _notifier) = setup(Duration::from_secs(5)).await;
    let mut j = job("r", Schedule::Interval { secs: 3600 }, "echo hi");
    scheduler.refresh(&j);
    assert!(scheduler.armed("r"));

    j.enabled = false;
    scheduler.refresh(&j);
    assert!(!scheduler.armed("r"));
}

#[tokio::test]
async fn start_all_arms_only_enabled_jobs() {
    let (conn, scheduler, _notifier) = setup(Duration::from_secs(5)).await;
    let on = job("on", Schedule::Interval { secs: 3600 }, "echo on");
    let mut off = job("off", Schedule::Interval { secs: 3600 }, "echo off");
    off.enabled = false;
    db::scripts::create(&conn, on).await.unwrap();
    db::scripts::create(&conn, off).await.unwrap();

    scheduler.start_all().await.unwrap();
    assert!(scheduler.armed("on"));
    assert!(!scheduler.armed("off"));
}

#[tokio::test]
async fn run_now_records_the_run_and_its_output() {
    let (conn, scheduler, notifier) = setup(Duration::from_secs(5)).await;
    let j = job("once", Schedule::Manual, "echo hello; echo oops >&2; exit 1");
    db::scripts::create(&conn, j).await.unwrap();

    let result = scheduler.run_now("once").await;
    assert!(!result.success);

    let stored = db::scripts::get(&conn, "once".to_string())
        .await
        .unwrap()
        .unwrap();
    let last_run = stored.last_run.unwrap();
    assert!(!last_run.success);
    let message = last_run.message.unwrap();
    assert!(message.contains("hello"));
    assert!(message.contains("oops"));
    assert_eq!(notifier.count(), 1);
}

#[tokio::test]
async fn run_now_on_unknown_id_is_a_user_error() {
    let (_conn, scheduler, _notifier) = setup(Duration::from_secs(5)).await;
    let result = scheduler.run_now("nope").await;
    assert!(!result.success);
    assert!(result.message.unwrap().contains("찾을 수 없습니다"));
}

#[tokio::test]
async fn hung_script_is_cut_off_at_the_deadline() {
    let (conn, scheduler, _notifier) = setup(Duration::from_millis(200)).await;
    let j = job("hang", Schedule::Manual, "sleep 30");
    db::scripts::create(&conn, j).await.unwrap();

    let result = scheduler.run_now("hang").await;
    assert!(!result.success);
    assert!(result.message.unwrap().contains("시간 초과"));

    let stored = db::scripts::get(&conn, "hang".to_string())
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.last_run.unwrap().success);
}

#[tokio::test]
async fn a_failing_script_does_not_stop_future_occurrences() {
    let (conn, scheduler, notifier) = setup(Duration::from_secs(5)).await;
    let j = job("flaky", Schedule::Interval { secs: 1 }, "exit 1");
    db::scripts::create(&conn, j.clone()).await.unwrap();

    scheduler.schedule(j);
    tokio::time::sleep(Duration::from_millis(1600)).await;

    assert_eq!(notifier.count(), 1);
    let (_, success) = notifier.events.lock().unwrap()[0].clone();
    assert!(!success);
    assert!(scheduler.armed("flaky"), "failure must not break the chain");
}
