pub mod models;

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;

pub async fn create_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(pool)
        .await?;

    // Plans own tasks, resources and suggestions; deletes cascade through them
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS plans (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            plan_type TEXT,
            total_estimated_hours REAL,
            total_estimated_cost_usd REAL,
            health_score INTEGER,
            last_analyzed_at DATETIME,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            CHECK (status IN ('draft', 'active', 'completed', 'archived')),
            CHECK (user_id != '')
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_plans_user_id ON plans(user_id)")
        .execute(pool)
        .await?;

    // `sort_order` is the task's ordinal position within its plan.
    // Uniqueness is not enforced: suggestion-driven inserts use a sentinel.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            plan_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            sort_order INTEGER NOT NULL DEFAULT 0,
            due_date DATE,
            estimated_time_hours REAL,
            difficulty INTEGER,
            estimated_cost_usd REAL,
            tools_needed TEXT NOT NULL DEFAULT '[]',
            prerequisites TEXT NOT NULL DEFAULT '[]',
            tags TEXT NOT NULL DEFAULT '[]',
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            FOREIGN KEY (plan_id) REFERENCES plans(id) ON DELETE CASCADE,
            CHECK (status IN ('pending', 'in_progress', 'completed')),
            CHECK (sort_order >= 0),
            CHECK (difficulty IS NULL OR (difficulty BETWEEN 1 AND 5))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_plan_order ON tasks(plan_id, sort_order)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subtasks (
            id TEXT PRIMARY KEY,
            task_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            sort_order INTEGER NOT NULL DEFAULT 0,
            completed BOOLEAN NOT NULL DEFAULT 0,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_subtasks_task_order ON subtasks(task_id, sort_order)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS resources (
            id TEXT PRIMARY KEY,
            plan_id TEXT NOT NULL,
            title TEXT NOT NULL,
            url TEXT NOT NULL,
            type TEXT NOT NULL DEFAULT 'link',
            created_at DATETIME NOT NULL,
            FOREIGN KEY (plan_id) REFERENCES plans(id) ON DELETE CASCADE,
            CHECK (type IN ('link', 'document', 'video', 'other'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Proactive suggestions. related_task_ids and metadata are JSON text;
    // their references into `tasks` are checked at validation time only.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS suggestions (
            id TEXT PRIMARY KEY,
            plan_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            suggestion_type TEXT NOT NULL,
            priority TEXT NOT NULL DEFAULT 'medium',
            status TEXT NOT NULL DEFAULT 'pending',
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            actionable BOOLEAN NOT NULL DEFAULT 1,
            action_button_text TEXT,
            related_task_ids TEXT NOT NULL DEFAULT '[]',
            confidence_score REAL NOT NULL DEFAULT 0.5,
            reasoning TEXT,
            metadata TEXT NOT NULL DEFAULT '{}',
            shown_at DATETIME,
            acted_at DATETIME,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            FOREIGN KEY (plan_id) REFERENCES plans(id) ON DELETE CASCADE,
            CHECK (suggestion_type IN ('next_task', 'add_task', 'optimize', 'warning', 'breakdown')),
            CHECK (priority IN ('low', 'medium', 'high')),
            CHECK (status IN ('pending', 'accepted', 'rejected', 'dismissed')),
            CHECK (confidence_score >= 0.0 AND confidence_score <= 1.0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Pending lookups and title dedup both filter on (plan_id, status)
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_suggestions_plan_status
        ON suggestions(plan_id, status, created_at)
        "#,
    )
    .execute(pool)
    .await?;

    // Key/value settings, overridden by environment variables
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS app_config (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        INSERT OR IGNORE INTO app_config (key, value)
        VALUES ('schema_version', '1')
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
