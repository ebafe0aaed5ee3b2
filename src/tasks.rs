use crate::db::models::{Task, TaskStatus};
use crate::error::{PlanError, Result};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::collections::HashSet;
use uuid::Uuid;

/// Largest order value accepted from callers. Appends past it are refused.
pub const MAX_ORDER: i64 = 1_000_000_000;

const TASK_COLUMNS: &str = r#"
    id, plan_id, title, description, status, sort_order, due_date,
    estimated_time_hours, difficulty, estimated_cost_usd,
    tools_needed, prerequisites, tags, created_at, updated_at
"#;

/// Fields for a new task. Everything except the title is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub estimated_time_hours: Option<f64>,
    #[serde(default)]
    pub difficulty: Option<i64>,
    #[serde(default)]
    pub estimated_cost_usd: Option<f64>,
    #[serde(default)]
    pub tools_needed: Vec<String>,
    #[serde(default)]
    pub prerequisites: Vec<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>, description: Option<String>) -> Self {
        Self {
            title: title.into(),
            description,
            ..Default::default()
        }
    }
}

/// Partial update; `None` leaves the column untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub due_date: Option<NaiveDate>,
    pub order: Option<i64>,
    pub difficulty: Option<i64>,
}

/// One entry of a bulk reorder request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReorderItem {
    pub task_id: String,
    pub new_order: i64,
}

/// Move `item` so it sits immediately before `before`, or at the end when
/// `before` is absent from the sequence. Returns the input unchanged when
/// `item` is not in it.
pub fn reposition<T: PartialEq + Clone>(sequence: &[T], item: &T, before: Option<&T>) -> Vec<T> {
    if !sequence.contains(item) {
        return sequence.to_vec();
    }

    let mut rest: Vec<T> = sequence.iter().filter(|t| *t != item).cloned().collect();
    let index = before
        .and_then(|anchor| rest.iter().position(|t| t == anchor))
        .unwrap_or(rest.len());
    rest.insert(index, item.clone());
    rest
}

fn validate_difficulty(difficulty: Option<i64>) -> Result<()> {
    match difficulty {
        Some(d) if !(1..=5).contains(&d) => Err(PlanError::InvalidInput(format!(
            "Difficulty must be between 1 and 5, got {}",
            d
        ))),
        _ => Ok(()),
    }
}

/// Orders live in `0..=MAX_ORDER`, for tasks and subtasks alike
pub(crate) fn validate_order(order: i64) -> Result<()> {
    if !(0..=MAX_ORDER).contains(&order) {
        return Err(PlanError::InvalidInput(format!(
            "Order must be between 0 and {}, got {}",
            MAX_ORDER, order
        )));
    }
    Ok(())
}

/// Order for an append after `max_order`
pub(crate) fn next_order(max_order: Option<i64>) -> Result<i64> {
    let next = match max_order {
        None => 1,
        Some(max) => max.checked_add(1).ok_or_else(|| {
            PlanError::InvalidInput("No order left to append after".to_string())
        })?,
    };
    validate_order(next)?;
    Ok(next)
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(PlanError::InvalidInput("Task title cannot be empty".to_string()));
    }
    Ok(())
}

pub struct TaskManager<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TaskManager<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a task at the end of the plan (max order + 1)
    pub async fn add_task(&self, plan_id: &str, task: NewTask) -> Result<Task> {
        let max_order: Option<i64> =
            sqlx::query_scalar("SELECT MAX(sort_order) FROM tasks WHERE plan_id = ?")
                .bind(plan_id)
                .fetch_one(self.pool)
                .await?;

        self.add_task_at(plan_id, task, next_order(max_order)?)
            .await
    }

    /// Insert a task with an explicit order value. Orders are not unique.
    pub async fn add_task_at(&self, plan_id: &str, task: NewTask, order: i64) -> Result<Task> {
        validate_title(&task.title)?;
        validate_difficulty(task.difficulty)?;
        validate_order(order)?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, plan_id, title, description, status, sort_order, due_date,
                estimated_time_hours, difficulty, estimated_cost_usd,
                tools_needed, prerequisites, tags, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, 'pending', ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(plan_id)
        .bind(task.title.trim())
        .bind(&task.description)
        .bind(order)
        .bind(task.due_date)
        .bind(task.estimated_time_hours)
        .bind(task.difficulty)
        .bind(task.estimated_cost_usd)
        .bind(serde_json::to_string(&task.tools_needed)?)
        .bind(serde_json::to_string(&task.prerequisites)?)
        .bind(serde_json::to_string(&task.tags)?)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        self.get_task(&id).await
    }

    pub async fn get_task(&self, id: &str) -> Result<Task> {
        let query = format!("SELECT {} FROM tasks WHERE id = ?", TASK_COLUMNS);
        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| PlanError::TaskNotFound(id.to_string()))
    }

    /// Fetch a task, treating a task from another plan as missing
    pub async fn get_task_in_plan(&self, plan_id: &str, id: &str) -> Result<Task> {
        let query = format!(
            "SELECT {} FROM tasks WHERE id = ? AND plan_id = ?",
            TASK_COLUMNS
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .bind(plan_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| PlanError::TaskNotFound(id.to_string()))
    }

    /// Tasks of a plan by `order`, ties broken by creation order
    pub async fn list_tasks(&self, plan_id: &str) -> Result<Vec<Task>> {
        let query = format!(
            "SELECT {} FROM tasks WHERE plan_id = ? ORDER BY sort_order ASC, created_at ASC, rowid ASC",
            TASK_COLUMNS
        );
        let tasks = sqlx::query_as::<_, Task>(&query)
            .bind(plan_id)
            .fetch_all(self.pool)
            .await?;
        Ok(tasks)
    }

    pub async fn task_ids_for_plan(&self, plan_id: &str) -> Result<HashSet<String>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM tasks WHERE plan_id = ?")
            .bind(plan_id)
            .fetch_all(self.pool)
            .await?;
        Ok(ids.into_iter().collect())
    }

    pub async fn task_exists_in_plan(&self, plan_id: &str, id: &str) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM tasks WHERE id = ? AND plan_id = ?")
                .bind(id)
                .bind(plan_id)
                .fetch_optional(self.pool)
                .await?;
        Ok(found.is_some())
    }

    pub async fn update_task(&self, id: &str, update: TaskUpdate) -> Result<Task> {
        let task = self.get_task(id).await?;

        if let Some(title) = &update.title {
            validate_title(title)?;
        }
        validate_difficulty(update.difficulty)?;
        if let Some(order) = update.order {
            validate_order(order)?;
        }

        let mut builder: sqlx::QueryBuilder<sqlx::Sqlite> =
            sqlx::QueryBuilder::new("UPDATE tasks SET updated_at = ");
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
        if let Some(status) = update.status {
            builder.push(", status = ").push_bind(status);
            has_updates = true;
        }
        if let Some(due_date) = update.due_date {
            builder.push(", due_date = ").push_bind(due_date);
            has_updates = true;
        }
        if let Some(order) = update.order {
            builder.push(", sort_order = ").push_bind(order);
            has_updates = true;
        }
        if let Some(difficulty) = update.difficulty {
            builder.push(", difficulty = ").push_bind(difficulty);
            has_updates = true;
        }

        if !has_updates {
            return Ok(task);
        }

        builder.push(" WHERE id = ").push_bind(id.to_string());
        builder.build().execute(self.pool).await?;

        self.get_task(id).await
    }

    pub async fn delete_task(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PlanError::TaskNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Apply explicit order values. Every task must exist; nothing is
    /// written if one is missing.
    pub async fn bulk_reorder(&self, items: &[ReorderItem]) -> Result<usize> {
        for item in items {
            validate_order(item.new_order)?;
            self.get_task(&item.task_id).await?;
        }

        let now = Utc::now();
        for item in items {
            sqlx::query("UPDATE tasks SET sort_order = ?, updated_at = ? WHERE id = ?")
                .bind(item.new_order)
                .bind(now)
                .bind(&item.task_id)
                .execute(self.pool)
                .await?;
        }

        tracing::debug!(count = items.len(), "Bulk reorder applied");
        Ok(items.len())
    }

    /// Move `task_id` to sit immediately before `before_task_id` (or at the
    /// end when the anchor is missing), then renumber the whole plan 1..n.
    ///
    /// A missing `task_id` is a no-op. Rows are rewritten one statement at a
    /// time without a transaction: concurrent moves on the same plan can
    /// interleave, and a failure part-way leaves mixed orders.
    pub async fn move_task(
        &self,
        plan_id: &str,
        task_id: &str,
        before_task_id: Option<&str>,
    ) -> Result<()> {
        let ids: Vec<String> = self
            .list_tasks(plan_id)
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect();

        let item = task_id.to_string();
        if !ids.contains(&item) {
            tracing::debug!(plan_id, task_id, "Move skipped, task not in plan");
            return Ok(());
        }

        let anchor = before_task_id.map(str::to_string);
        let reordered = reposition(&ids, &item, anchor.as_ref());

        let now = Utc::now();
        for (index, id) in reordered.iter().enumerate() {
            sqlx::query("UPDATE tasks SET sort_order = ?, updated_at = ? WHERE id = ?")
                .bind(index as i64 + 1)
                .bind(now)
                .bind(id)
                .execute(self.pool)
                .await?;
        }

        tracing::debug!(plan_id, task_id, before = ?before_task_id, "Task moved");
        Ok(())
    }

    /// Plan that owns the task
    pub async fn plan_id_of(&self, task_id: &str) -> Result<String> {
        sqlx::query_scalar("SELECT plan_id FROM tasks WHERE id = ?")
            .bind(task_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| PlanError::TaskNotFound(task_id.to_string()))
    }
}
