use crate::db::models::{Plan, PlanStats, PlanStatus, PlanWithDetails, Resource, ResourceType};
use crate::error::{PlanError, Result};
use crate::tasks::TaskManager;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

const PLAN_COLUMNS: &str = r#"
    id, user_id, title, description, status, plan_type,
    total_estimated_hours, total_estimated_cost_usd, health_score,
    last_analyzed_at, created_at, updated_at
"#;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Default)]
pub struct NewPlan {
    pub title: String,
    pub description: Option<String>,
    pub plan_type: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewResource {
    pub title: String,
    pub url: String,
    pub resource_type: Option<ResourceType>,
}

/// Aggregate metadata computed from a plan's tasks
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlanAggregates {
    pub total_estimated_hours: f64,
    pub total_estimated_cost_usd: f64,
    pub health_score: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedPlans {
    pub plans: Vec<Plan>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

pub struct PlanManager<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PlanManager<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_plan(&self, user_id: &str, plan: NewPlan) -> Result<Plan> {
        if user_id.trim().is_empty() {
            return Err(PlanError::InvalidInput("User id cannot be empty".to_string()));
        }
        if plan.title.trim().is_empty() {
            return Err(PlanError::InvalidInput("Plan title cannot be empty".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO plans (id, user_id, title, description, status, plan_type, created_at, updated_at)
            VALUES (?, ?, ?, ?, 'active', ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(plan.title.trim())
        .bind(&plan.description)
        .bind(&plan.plan_type)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        tracing::info!(plan_id = %id, user_id, "Plan created");
        self.get_plan(&id).await
    }

    pub async fn get_plan(&self, id: &str) -> Result<Plan> {
        let query = format!("SELECT {} FROM plans WHERE id = ?", PLAN_COLUMNS);
        sqlx::query_as::<_, Plan>(&query)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| PlanError::PlanNotFound(id.to_string()))
    }

    /// Load the plan and check it belongs to `user_id`
    pub async fn verify_ownership(&self, plan_id: &str, user_id: &str) -> Result<Plan> {
        let plan = self.get_plan(plan_id).await?;
        if plan.user_id != user_id {
            tracing::warn!(plan_id, user_id, "Plan access denied");
            return Err(PlanError::Forbidden(format!(
                "Plan {} does not belong to the current user",
                plan_id
            )));
        }
        Ok(plan)
    }

    pub async fn get_plan_with_details(&self, id: &str) -> Result<PlanWithDetails> {
        let plan = self.get_plan(id).await?;
        let tasks = TaskManager::new(self.pool).list_tasks(id).await?;
        let resources = self.list_resources(id).await?;

        Ok(PlanWithDetails {
            plan,
            tasks,
            resources,
        })
    }

    /// Newest first. `page` is 1-based; `limit` is clamped to 1..=100.
    pub async fn list_plans(
        &self,
        user_id: &str,
        status: Option<PlanStatus>,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<PaginatedPlans> {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = (page - 1)
            .checked_mul(limit)
            .ok_or_else(|| PlanError::InvalidInput(format!("Page {} is out of range", page)))?;

        let mut count_query: sqlx::QueryBuilder<sqlx::Sqlite> =
            sqlx::QueryBuilder::new("SELECT COUNT(*) FROM plans WHERE user_id = ");
        count_query.push_bind(user_id);
        if let Some(status) = status {
            count_query.push(" AND status = ").push_bind(status);
        }
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(self.pool)
            .await?;

        let mut builder: sqlx::QueryBuilder<sqlx::Sqlite> =
            sqlx::QueryBuilder::new(format!("SELECT {} FROM plans WHERE user_id = ", PLAN_COLUMNS));
        builder.push_bind(user_id);
        if let Some(status) = status {
            builder.push(" AND status = ").push_bind(status);
        }
        builder
            .push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let plans = builder
            .build_query_as::<Plan>()
            .fetch_all(self.pool)
            .await?;

        Ok(PaginatedPlans {
            plans,
            total,
            page,
            limit,
        })
    }

    pub async fn plan_stats(&self, user_id: &str) -> Result<PlanStats> {
        let rows: Vec<(PlanStatus, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM plans WHERE user_id = ? GROUP BY status",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        let mut stats = PlanStats::default();
        for (status, count) in rows {
            match status {
                PlanStatus::Active => stats.active = count,
                PlanStatus::Completed => stats.completed = count,
                PlanStatus::Archived => stats.archived = count,
                PlanStatus::Draft => stats.draft = count,
            }
            stats.total += count;
        }
        Ok(stats)
    }

    pub async fn update_status(&self, id: &str, status: PlanStatus) -> Result<Plan> {
        let result = sqlx::query("UPDATE plans SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PlanError::PlanNotFound(id.to_string()));
        }
        self.get_plan(id).await
    }

    /// Delete a plan; tasks, subtasks, resources and suggestions cascade
    pub async fn delete_plan(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM plans WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PlanError::PlanNotFound(id.to_string()));
        }
        tracing::info!(plan_id = id, "Plan deleted");
        Ok(())
    }

    pub async fn update_aggregates(&self, id: &str, aggregates: PlanAggregates) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE plans
            SET total_estimated_hours = ?, total_estimated_cost_usd = ?, health_score = ?,
                last_analyzed_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(aggregates.total_estimated_hours)
        .bind(aggregates.total_estimated_cost_usd)
        .bind(aggregates.health_score)
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn add_resource(&self, plan_id: &str, resource: NewResource) -> Result<Resource> {
        let id = Uuid::new_v4().to_string();
        let resource_type = resource.resource_type.unwrap_or(ResourceType::Link);

        sqlx::query(
            "INSERT INTO resources (id, plan_id, title, url, type, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(plan_id)
        .bind(&resource.title)
        .bind(&resource.url)
        .bind(resource_type)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;

        let created = sqlx::query_as::<_, Resource>(
            "SELECT id, plan_id, title, url, type, created_at FROM resources WHERE id = ?",
        )
        .bind(&id)
        .fetch_one(self.pool)
        .await?;
        Ok(created)
    }

    pub async fn list_resources(&self, plan_id: &str) -> Result<Vec<Resource>> {
        let resources = sqlx::query_as::<_, Resource>(
            r#"
            SELECT id, plan_id, title, url, type, created_at
            FROM resources
            WHERE plan_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(plan_id)
        .fetch_all(self.pool)
        .await?;
        Ok(resources)
    }
}
