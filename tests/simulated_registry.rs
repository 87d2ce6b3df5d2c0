use std::path::{Path, PathBuf};
use std::sync::Arc;

use jobsd::adapters::SimulatedAdapter;
use jobsd::config::AppConfig;
use jobsd::core::JobRegistry;

fn write_plist(dir: &Path, file_name: &str, body: &str) -> PathBuf {
    let path = dir.join(file_name);
    let content = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
{body}
</dict>
</plist>
"#
    );
    std::fs::write(&path, content).unwrap();
    path
}

fn basic_job(label: &str, log_path: Option<&Path>) -> String {
    let mut body = format!(
        "<key>Label</key><string>{label}</string>
<key>ProgramArguments</key><array><string>/bin/sh</string><string>/opt/jobs/{label}.sh</string></array>
<key>StartInterval</key><integer>600</integer>"
    );
    if let Some(log) = log_path {
        body.push_str(&format!(
            "\n<key>StandardOutPath</key><string>{}</string>",
            log.display()
        ));
    }
    body
}

fn registry_in(dir: &Path) -> (JobRegistry, SimulatedAdapter) {
    let config = AppConfig {
        agents_dir: dir.to_path_buf(),
        ..AppConfig::default()
    };
    let adapter = SimulatedAdapter::new();
    let registry = JobRegistry::new(Arc::new(config), Arc::new(adapter.clone()));
    (registry, adapter)
}

#[tokio::test]
async fn listing_merges_definitions_with_live_state() {
    let dir = tempfile::tempdir().unwrap();
    write_plist(dir.path(), "com.jobsd.alpha.plist", &basic_job("com.jobsd.alpha", None));
    write_plist(dir.path(), "com.jobsd.beta.plist", &basic_job("com.jobsd.beta", None));

    let (registry, adapter) = registry_in(dir.path());
    adapter.preload("com.jobsd.alpha", Some(42));

    let jobs = registry.list_all().await;
    assert_eq!(jobs.len(), 2);

    let alpha = jobs
        .iter()
        .find(|j| j.definition.label == "com.jobsd.alpha")
        .unwrap();
    assert!(alpha.is_loaded);
    assert_eq!(alpha.pid, Some(42));

    let beta = jobs
        .iter()
        .find(|j| j.definition.label == "com.jobsd.beta")
        .unwrap();
    assert!(!beta.is_loaded);
    assert_eq!(beta.pid, None);
}

#[tokio::test]
async fn files_outside_the_prefix_are_not_listed() {
    let dir = tempfile::tempdir().unwrap();
    write_plist(dir.path(), "com.jobsd.mine.plist", &basic_job("com.jobsd.mine", None));
    write_plist(dir.path(), "org.other.job.plist", &basic_job("org.other.job", None));

    let (registry, _adapter) = registry_in(dir.path());
    let jobs = registry.list_all().await;

    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].definition.label, "com.jobsd.mine");
}

#[tokio::test]
async fn a_malformed_plist_does_not_abort_discovery() {
    let dir = tempfile::tempdir().unwrap();
    write_plist(dir.path(), "com.jobsd.good.plist", &basic_job("com.jobsd.good", None));
    std::fs::write(dir.path().join("com.jobsd.bad.plist"), "garbage").unwrap();

    let (registry, _adapter) = registry_in(dir.path());
    let jobs = registry.list_all().await;

    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].definition.label, "com.jobsd.good");
}

#[tokio::test]
async fn a_missing_agents_directory_lists_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist");

    let (registry, _adapter) = registry_in(&missing);
    assert!(registry.list_all().await.is_empty());
}

#[tokio::test]
async fn live_query_failure_degrades_to_all_unloaded() {
    let dir = tempfile::tempdir().unwrap();
    write_plist(dir.path(), "com.jobsd.one.plist", &basic_job("com.jobsd.one", None));

    let (registry, adapter) = registry_in(dir.path());
    adapter.preload("com.jobsd.one", None);
    adapter.fail_next("launchctl unavailable");

    let jobs = registry.list_all().await;
    assert_eq!(jobs.len(), 1);
    assert!(!jobs[0].is_loaded);
}

#[tokio::test]
async fn toggle_loads_then_unloads() {
    let dir = tempfile::tempdir().unwrap();
    write_plist(dir.path(), "com.jobsd.flip.plist", &basic_job("com.jobsd.flip", None));

    let (registry, adapter) = registry_in(dir.path());

    let result = registry.toggle("com.jobsd.flip").await;
    assert!(result.success);
    assert!(adapter.is_loaded("com.jobsd.flip"));

    let result = registry.toggle("com.jobsd.flip").await;
    assert!(result.success);
    assert!(!adapter.is_loaded("com.jobsd.flip"));
}

#[tokio::test]
async fn toggle_failure_becomes_a_message_not_a_panic() {
    let dir = tempfile::tempdir().unwrap();
    write_plist(dir.path(), "com.jobsd.bad.plist", &basic_job("com.jobsd.bad", None));

    let (registry, adapter) = registry_in(dir.path());
    // Toggle queries live state first, then issues the load; fail both.
    adapter.fail_next("launchctl unavailable");
    adapter.fail_next("permission denied");

    let result = registry.toggle("com.jobsd.bad").await;
    assert!(!result.success);
    assert!(result.message.unwrap().contains("permission denied"));
}

#[tokio::test]
async fn starting_an_unloaded_job_is_a_user_error() {
    let dir = tempfile::tempdir().unwrap();
    write_plist(dir.path(), "com.jobsd.idle.plist", &basic_job("com.jobsd.idle", None));

    let (registry, adapter) = registry_in(dir.path());
    let result = registry.start("com.jobsd.idle").await;

    assert!(!result.success);
    assert!(result.message.unwrap().contains("로드되지 않은"));
    assert!(adapter.started().is_empty());
}

#[tokio::test]
async fn starting_a_loaded_job_invokes_the_scheduler() {
    let dir = tempfile::tempdir().unwrap();
    write_plist(dir.path(), "com.jobsd.live.plist", &basic_job("com.jobsd.live", None));

    let (registry, adapter) = registry_in(dir.path());
    adapter.preload("com.jobsd.live", None);

    let result = registry.start("com.jobsd.live").await;
    assert!(result.success);
    assert_eq!(adapter.started(), vec!["com.jobsd.live".to_string()]);
}

#[tokio::test]
async fn starting_an_unknown_label_reports_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, _adapter) = registry_in(dir.path());

    let result = registry.start("com.jobsd.ghost").await;
    assert!(!result.success);
    assert!(result.message.unwrap().contains("찾을 수 없습니다"));
}

#[tokio::test]
async fn jobs_with_run_evidence_sort_before_never_run() {
    let dir = tempfile::tempdir().unwrap();
    let log_old = dir.path().join("old.log");
    let log_new = dir.path().join("new.log");
    std::fs::write(&log_old, "finished\n").unwrap();
    std::fs::write(&log_new, "finished\n").unwrap();

    // old.log ran an hour before new.log; quiet.log never ran.
    let base = std::fs::metadata(&log_new).unwrap().modified().unwrap();
    filetime::set_file_mtime(
        &log_old,
        filetime::FileTime::from_system_time(base - std::time::Duration::from_secs(3600)),
    )
    .unwrap();

    write_plist(
        dir.path(),
        "com.jobsd.old.plist",
        &basic_job("com.jobsd.old", Some(&log_old)),
    );
    write_plist(
        dir.path(),
        "com.jobsd.new.plist",
        &basic_job("com.jobsd.new", Some(&log_new)),
    );
    write_plist(dir.path(), "com.jobsd.quiet.plist", &basic_job("com.jobsd.quiet", None));

    let (registry, _adapter) = registry_in(dir.path());
    let jobs = registry.list_all().await;

    let labels: Vec<&str> = jobs.iter().map(|j| j.definition.label.as_str()).collect();
    assert_eq!(
        labels,
        vec!["com.jobsd.new", "com.jobsd.old", "com.jobsd.quiet"]
    );
}

#[tokio::test]
async fn last_run_verdict_comes_from_the_log_tail() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("failing.log");
    std::fs::write(&log, "Error: quota exceeded\n").unwrap();

    write_plist(
        dir.path(),
        "com.jobsd.failing.plist",
        &basic_job("com.jobsd.failing", Some(&log)),
    );

    let (registry, _adapter) = registry_in(dir.path());
    let state = registry.find_by_id("com.jobsd.failing").await.unwrap();

    let last_run = state.last_run.unwrap();
    assert!(!last_run.success);
    assert!(last_run.message.unwrap().contains("quota exceeded"));
}
