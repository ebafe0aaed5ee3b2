use crate::db::models::{Suggestion, SuggestionStatus};
use crate::error::{PlanError, Result};
use crate::suggestions::validation::ValidatedSuggestion;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

const SUGGESTION_COLUMNS: &str = r#"
    id, plan_id, user_id, suggestion_type, priority, status, title, description,
    actionable, action_button_text, related_task_ids, confidence_score, reasoning,
    metadata, shown_at, acted_at, created_at, updated_at
"#;

/// Persistence for suggestions. Does no ownership checks; callers do.
pub struct SuggestionStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SuggestionStore<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        plan_id: &str,
        user_id: &str,
        suggestion: &ValidatedSuggestion,
    ) -> Result<Suggestion> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO suggestions (
                id, plan_id, user_id, suggestion_type, priority, status, title, description,
                actionable, action_button_text, related_task_ids, confidence_score, reasoning,
                metadata, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, 'pending', ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(plan_id)
        .bind(user_id)
        .bind(suggestion.suggestion_type())
        .bind(suggestion.priority)
        .bind(&suggestion.title)
        .bind(&suggestion.description)
        .bind(suggestion.actionable)
        .bind(&suggestion.action_button_text)
        .bind(serde_json::to_string(&suggestion.related_task_ids)?)
        .bind(suggestion.confidence_score)
        .bind(&suggestion.reasoning)
        .bind(serde_json::to_string(&suggestion.action.metadata())?)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        self.get(&id).await
    }

    pub async fn get(&self, id: &str) -> Result<Suggestion> {
        let query = format!("SELECT {} FROM suggestions WHERE id = ?", SUGGESTION_COLUMNS);
        sqlx::query_as::<_, Suggestion>(&query)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| PlanError::SuggestionNotFound(id.to_string()))
    }

    /// Pending suggestions for a plan, newest first
    pub async fn get_pending(&self, plan_id: &str) -> Result<Vec<Suggestion>> {
        let query = format!(
            "SELECT {} FROM suggestions WHERE plan_id = ? AND status = 'pending' ORDER BY created_at DESC, rowid DESC",
            SUGGESTION_COLUMNS
        );
        let suggestions = sqlx::query_as::<_, Suggestion>(&query)
            .bind(plan_id)
            .fetch_all(self.pool)
            .await?;
        Ok(suggestions)
    }

    pub async fn find_pending_by_title(
        &self,
        plan_id: &str,
        title: &str,
    ) -> Result<Option<Suggestion>> {
        let query = format!(
            "SELECT {} FROM suggestions WHERE plan_id = ? AND title = ? AND status = 'pending' LIMIT 1",
            SUGGESTION_COLUMNS
        );
        let suggestion = sqlx::query_as::<_, Suggestion>(&query)
            .bind(plan_id)
            .bind(title)
            .fetch_optional(self.pool)
            .await?;
        Ok(suggestion)
    }

    pub async fn dismiss(&self, id: &str) -> Result<()> {
        self.transition(id, SuggestionStatus::Dismissed).await
    }

    pub async fn reject(&self, id: &str) -> Result<()> {
        self.transition(id, SuggestionStatus::Rejected).await
    }

    pub async fn mark_accepted(&self, id: &str) -> Result<()> {
        self.transition(id, SuggestionStatus::Accepted).await
    }

    /// Stamp `shown_at` the first time suggestions are served
    pub async fn mark_shown(&self, ids: &[String]) -> Result<()> {
        let now = Utc::now();
        for id in ids {
            sqlx::query(
                "UPDATE suggestions SET shown_at = ?, updated_at = ? WHERE id = ? AND shown_at IS NULL",
            )
            .bind(now)
            .bind(now)
            .bind(id)
            .execute(self.pool)
            .await?;
        }
        Ok(())
    }

    /// pending -> `target`. The status guard lives in the UPDATE itself so a
    /// concurrent transition cannot be overwritten.
    async fn transition(&self, id: &str, target: SuggestionStatus) -> Result<()> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE suggestions
            SET status = ?, acted_at = ?, updated_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(target)
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get(id).await?;
            return Err(PlanError::ActionNotAllowed(format!(
                "Suggestion {} is already {}",
                id,
                current.status.as_str()
            )));
        }

        crate::log_suggestion_operation!(target.as_str(), id);
        Ok(())
    }
}
