//! Proactive suggestion engine: generation from the LLM, validation of its
//! output, persistence, and execution of accepted actions.

pub mod executor;
pub mod generator;
pub mod rate_limiter;
pub mod store;
pub mod validation;

pub use executor::ActionExecutor;
pub use generator::SuggestionGenerator;
pub use rate_limiter::{Clock, GenerationLimiter, InMemoryRateLimiter, SystemClock};
pub use store::SuggestionStore;
pub use validation::{validate_suggestion, SuggestionAction, ValidatedSuggestion};

use crate::db::models::{Plan, Suggestion};
use crate::error::{PlanError, Result};
use crate::llm::CompletionClient;
use crate::tasks::TaskManager;
use sqlx::SqlitePool;

/// Serve a plan's pending suggestions, generating new ones when there are
/// none or when `force` is set. Generation is admitted by `limiter`; a
/// refused generation is `RateLimited`.
pub async fn fetch_suggestions(
    pool: &SqlitePool,
    client: &dyn CompletionClient,
    limiter: &dyn GenerationLimiter,
    plan: &Plan,
    user_id: &str,
    force: bool,
) -> Result<Vec<Suggestion>> {
    let store = SuggestionStore::new(pool);
    let pending = store.get_pending(&plan.id).await?;

    if !pending.is_empty() && !force {
        mark_shown(&store, &pending).await;
        return Ok(pending);
    }

    if !limiter.is_allowed(user_id, &plan.id) {
        return Err(PlanError::RateLimited {
            remaining: limiter.get_remaining(user_id, &plan.id),
        });
    }

    let tasks = TaskManager::new(pool).list_tasks(&plan.id).await?;
    SuggestionGenerator::new(pool, client)
        .generate_proactive_suggestions(plan, &tasks, user_id)
        .await;

    let pending = store.get_pending(&plan.id).await?;
    mark_shown(&store, &pending).await;
    Ok(pending)
}

async fn mark_shown(store: &SuggestionStore<'_>, suggestions: &[Suggestion]) {
    let ids: Vec<String> = suggestions
        .iter()
        .filter(|s| s.shown_at.is_none())
        .map(|s| s.id.clone())
        .collect();
    if let Err(e) = store.mark_shown(&ids).await {
        tracing::warn!(error = %e, "Failed to record suggestion display");
    }
}
