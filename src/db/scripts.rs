use anyhow::{Result, anyhow};
use chrono::{DateTime, Local};
use tokio_rusqlite::{Connection, params, rusqlite};
use uuid::Uuid;

use crate::core::models::{RunInfo, ScriptJob};
use crate::core::schedule::Schedule;

const SELECT_COLUMNS: &str = "s.id, s.name, s.script, s.schedule, s.enabled,
    (SELECT ran_at  FROM script_runs WHERE script_id = s.id ORDER BY ran_at DESC LIMIT 1),
    (SELECT success FROM script_runs WHERE script_id = s.id ORDER BY ran_at DESC LIMIT 1),
    (SELECT message FROM script_runs WHERE script_id = s.id ORDER BY ran_at DESC LIMIT 1)";

pub async fn create(conn: &Connection, job: ScriptJob) -> Result<()> {
    let schedule = serde_json::to_string(&job.schedule)?;
    conn.call(move |c| {
        c.execute(
            "INSERT INTO scripts (id, name, script, schedule, enabled)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![&job.id, &job.name, &job.script, &schedule, job.enabled],
        )?;
        Ok::<_, rusqlite::Error>(())
    })
    .await
    .map_err(|e| anyhow!("failed to create script job: {}", e))
}

pub async fn list(conn: &Connection) -> Result<Vec<ScriptJob>> {
    conn.call(move |c| {
        let mut stmt = c.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM scripts s ORDER BY s.created_at, s.id"
        ))?;
        let jobs = stmt
            .query_map([], job_from_row)?
            .collect::<std::result::Result<Vec<ScriptJob>, rusqlite::Error>>()?;
        Ok::<_, rusqlite::Error>(jobs)
    })
    .await
    .map_err(|e| anyhow!("failed to list script jobs: {}", e))
}

pub async fn get(conn: &Connection, id: String) -> Result<Option<ScriptJob>> {
    conn.call(move |c| {
        use tokio_rusqlite::rusqlite::OptionalExtension;

        let mut stmt = c.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM scripts s WHERE s.id = ?1"
        ))?;
        let job = stmt.query_row(params![id], job_from_row).optional()?;
        Ok::<_, rusqlite::Error>(job)
    })
    .await
    .map_err(|e| anyhow!("failed to load script job: {}", e))
}

pub async fn update(conn: &Connection, job: ScriptJob) -> Result<()> {
    let schedule = serde_json::to_string(&job.schedule)?;
    conn.call(move |c| {
        c.execute(
            "UPDATE scripts SET name = ?2, script = ?3, schedule = ?4, enabled = ?5
             WHERE id = ?1",
            params![&job.id, &job.name, &job.script, &schedule, job.enabled],
        )?;
        Ok::<_, rusqlite::Error>(())
    })
    .await
    .map_err(|e| anyhow!("failed to update script job: {}", e))
}

pub async fn delete(conn: &Connection, id: String) -> Result<()> {
    conn.call(move |c| {
        c.execute("DELETE FROM scripts WHERE id = ?1", params![id])?;
        Ok::<_, rusqlite::Error>(())
    })
    .await
    .map_err(|e| anyhow!("failed to delete script job: {}", e))
}

pub async fn set_enabled(conn: &Connection, id: String, enabled: bool) -> Result<()> {
    conn.call(move |c| {
        c.execute(
            "UPDATE scripts SET enabled = ?2 WHERE id = ?1",
            params![id, enabled],
        )?;
        Ok::<_, rusqlite::Error>(())
    })
    .await
    .map_err(|e| anyhow!("failed to toggle script job: {}", e))
}

pub async fn record_run(conn: &Connection, script_id: String, run: RunInfo) -> Result<()> {
    let ran_at = run.timestamp.to_rfc3339();
    conn.call(move |c| {
        let run_id = Uuid::now_v7().to_string();
        c.execute(
            "INSERT INTO script_runs (id, script_id, ran_at, success, message)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![run_id, script_id, ran_at, run.success, run.message],
        )?;
        Ok::<_, rusqlite::Error>(())
    })
    .await
    .map_err(|e| anyhow!("failed to record script run: {}", e))
}

fn job_from_row(row: &rusqlite::Row) -> std::result::Result<ScriptJob, rusqlite::Error> {
    let schedule_json: String = row.get(3)?;
    // A corrupt schedule column degrades to manual-only rather than
    // poisoning the whole listing.
    let schedule = serde_json::from_str(&schedule_json).unwrap_or(Schedule::Manual);

    let ran_at: Option<String> = row.get(5)?;
    let success: Option<bool> = row.get(6)?;
    let message: Option<String> = row.get(7)?;
    let last_run = match (ran_at, success) {
        (Some(ts), Some(success)) => DateTime::parse_from_rfc3339(&ts)
            .ok()
            .map(|dt| RunInfo {
                timestamp: dt.with_timezone(&Local),
                success,
                message,
            }),
        _ => None,
    };

    Ok(ScriptJob {
        id: row.get(0)?,
        name: row.get(1)?,
        script: row.get(2)?,
        schedule,
        enabled: row.get(4)?,
        last_run,
    })
}
