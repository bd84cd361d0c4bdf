//! `SQLite` schema bootstrap logic.
//!
//! All table definitions use `CREATE TABLE IF NOT EXISTS`, so this runs on
//! every startup.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table definitions to the connected `SQLite` database.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS app_user (
    id                  TEXT PRIMARY KEY NOT NULL,
    username            TEXT NOT NULL,
    email               TEXT,
    push_token          TEXT,
    analysis_enabled    INTEGER NOT NULL DEFAULT 0,
    first_run_time      TEXT,
    second_run_time     TEXT,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS task (
    id                  TEXT PRIMARY KEY NOT NULL,
    user_id             TEXT NOT NULL,
    title               TEXT NOT NULL,
    description         TEXT,
    priority            TEXT NOT NULL CHECK(priority IN ('Low','Medium','High','Completed')),
    previous_priority   TEXT CHECK(previous_priority IN ('Low','Medium','High')),
    status              TEXT NOT NULL CHECK(status IN ('Pending','In-progress','Completed')),
    completed           INTEGER NOT NULL DEFAULT 0,
    due_date            TEXT NOT NULL,
    reminder_time       TEXT,
    notification_sent   INTEGER NOT NULL DEFAULT 0,
    retouched_by_ai     INTEGER NOT NULL DEFAULT 0,
    priority_logs       TEXT NOT NULL DEFAULT '[]',
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL,
    version             INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_task_user ON task(user_id);
CREATE INDEX IF NOT EXISTS idx_task_reminder ON task(completed, notification_sent, reminder_time);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
