use crate::db::models::Subtask;
use crate::error::{PlanError, Result};
use crate::tasks::{next_order, validate_order};
use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

const SUBTASK_COLUMNS: &str =
    "id, task_id, title, description, sort_order, completed, created_at, updated_at";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubtaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub order: Option<i64>,
}

pub struct SubtaskManager<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SubtaskManager<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_subtasks(&self, task_id: &str) -> Result<Vec<Subtask>> {
        let query = format!(
            "SELECT {} FROM subtasks WHERE task_id = ? ORDER BY sort_order ASC, created_at ASC, rowid ASC",
            SUBTASK_COLUMNS
        );
        let subtasks = sqlx::query_as::<_, Subtask>(&query)
            .bind(task_id)
            .fetch_all(self.pool)
            .await?;
        Ok(subtasks)
    }

    pub async fn get_subtask(&self, id: &str) -> Result<Subtask> {
        let query = format!("SELECT {} FROM subtasks WHERE id = ?", SUBTASK_COLUMNS);
        sqlx::query_as::<_, Subtask>(&query)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| PlanError::SubtaskNotFound(id.to_string()))
    }

    /// Append after the task's current last subtask
    pub async fn add_subtask(
        &self,
        task_id: &str,
        title: &str,
        description: Option<&str>,
    ) -> Result<Subtask> {
        let max_order: Option<i64> =
            sqlx::query_scalar("SELECT MAX(sort_order) FROM subtasks WHERE task_id = ?")
                .bind(task_id)
                .fetch_one(self.pool)
                .await?;

        self.add_subtask_at(task_id, title, description, next_order(max_order)?)
            .await
    }

    pub async fn add_subtask_at(
        &self,
        task_id: &str,
        title: &str,
        description: Option<&str>,
        order: i64,
    ) -> Result<Subtask> {
        if title.trim().is_empty() {
            return Err(PlanError::InvalidInput(
                "Subtask title cannot be empty".to_string(),
            ));
        }
        validate_order(order)?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO subtasks (id, task_id, title, description, sort_order, completed, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(task_id)
        .bind(title.trim())
        .bind(description)
        .bind(order)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        self.get_subtask(&id).await
    }

    pub async fn update_subtask(&self, id: &str, update: SubtaskUpdate) -> Result<Subtask> {
        let subtask = self.get_subtask(id).await?;

        if let Some(title) = &update.title {
            if title.trim().is_empty() {
                return Err(PlanError::InvalidInput(
                    "Subtask title cannot be empty".to_string(),
                ));
            }
        }
        if let Some(order) = update.order {
            validate_order(order)?;
        }

        let mut builder: sqlx::QueryBuilder<sqlx::Sqlite> =
            sqlx::QueryBuilder::new("UPDATE subtasks SET updated_at = ");
        builder.push_bind(Utc::now());
        let mut has_updates = false;

        if let Some(title) = &update.title {
            builder.push(", title = ").push_bind(title.trim().to_string());
            has_updates = true;
        }
        if let Some(description) = &update.description {
            builder.push(", description = ").push_bind(description.clone());
            has_updates = true;
        }
        if let Some(completed) = update.completed {
            builder.push(", completed = ").push_bind(completed);
            has_updates = true;
        }
        if let Some(order) = update.order {
            builder.push(", sort_order = ").push_bind(order);
            has_updates = true;
        }

        if !has_updates {
            return Ok(subtask);
        }

        builder.push(" WHERE id = ").push_bind(id.to_string());
        builder.build().execute(self.pool).await?;

        self.get_subtask(id).await
    }

    pub async fn delete_subtask(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM subtasks WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PlanError::SubtaskNotFound(id.to_string()));
        }
        Ok(())
    }
}
