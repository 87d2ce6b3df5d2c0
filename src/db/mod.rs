use anyhow::Result;
use tokio_rusqlite::Connection;

pub mod scripts;

pub async fn init(path: &str) -> Result<Connection> {
    let conn = Connection::open(path).await?;

    conn.call(|conn| {
        let schema = include_str!("schema.sql");
        conn.execute_batch(schema)?;

        // Enable foreign keys (SQLite disables them by default!)
        conn.execute("PRAGMA foreign_keys = ON;", [])?;

        Ok::<_, tokio_rusqlite::rusqlite::Error>(())
    })
    .await?;

    Ok(conn)
}
