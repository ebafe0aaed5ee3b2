use crate::db::models::{Plan, Suggestion, Task};
use crate::llm::{clean_json_response, CompletionClient, CompletionRequest};
use crate::suggestions::store::SuggestionStore;
use crate::suggestions::validation::validate_with_known_ids;
use crate::tasks::TaskManager;
use serde_json::{json, Value};
use sqlx::SqlitePool;

/// Candidates considered per generation, before validation
pub const MAX_CANDIDATES: usize = 5;

const SYSTEM_PROMPT_SUGGESTIONS: &str = r#"You are an expert project manager. Proactively analyze a project plan and suggest nudges that help the user succeed.

Analyze the PLAN and TASKS. Look for:
1. Breakdown opportunities: tasks that are vague or estimated above 4 hours.
2. Missing steps: logical gaps (e.g. "Travel to X" but no "Book tickets").
3. Risk warnings: deadlines approaching without prerequisites met.
4. Optimizations: tasks that should be reordered.

Return a JSON object:
{
  "suggestions": [
    {
      "title": "Short catchy title",
      "description": "Clear explanation of why this is needed",
      "suggestion_type": "breakdown" | "add_task" | "optimize" | "warning",
      "priority": "low" | "medium" | "high",
      "action_button_text": "Button label, e.g. 'Break it down'",
      "related_task_ids": ["<task id from TASKS>"],
      "confidence_score": 0.9,
      "reasoning": "Why this matters",
      "metadata": {
        "suggested_tasks": [{"title": "...", "description": "..."}],
        "operations": [{"type": "reorder", "task_id": "<id>", "before_task_id": "<id>"}]
      }
    }
  ]
}

Use metadata.suggested_tasks only for add_task and metadata.operations only for optimize.
Only reference task ids that appear in TASKS."#;

/// Produces proactive suggestions for a plan. Does no rate limiting; the
/// caller decides whether a generation is admitted.
pub struct SuggestionGenerator<'a> {
    pool: &'a SqlitePool,
    client: &'a dyn CompletionClient,
}

impl<'a> SuggestionGenerator<'a> {
    pub fn new(pool: &'a SqlitePool, client: &'a dyn CompletionClient) -> Self {
        Self { pool, client }
    }

    /// Ask the LLM for suggestions, validate them and persist the ones that
    /// are not duplicates of a pending suggestion. Never fails: an LLM or
    /// parse error yields an empty list, and a failing candidate is skipped.
    pub async fn generate_proactive_suggestions(
        &self,
        plan: &Plan,
        tasks: &[Task],
        user_id: &str,
    ) -> Vec<Suggestion> {
        let request = CompletionRequest::new(build_prompt(plan, tasks))
            .with_system(SYSTEM_PROMPT_SUGGESTIONS)
            .with_temperature(0.7)
            .json();

        let content = match self.client.complete(request).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(plan_id = %plan.id, error = %e, "Suggestion generation failed");
                return Vec::new();
            },
        };

        let Some(candidates) = extract_candidates(&content) else {
            tracing::warn!(plan_id = %plan.id, "Suggestion response was not valid JSON");
            return Vec::new();
        };

        let known = match TaskManager::new(self.pool).task_ids_for_plan(&plan.id).await {
            Ok(ids) => Some(ids),
            Err(e) => {
                tracing::warn!(plan_id = %plan.id, error = %e, "Task id lookup failed, dropping related ids");
                None
            },
        };

        let store = SuggestionStore::new(self.pool);
        let mut created = Vec::new();

        for raw in candidates.iter().take(MAX_CANDIDATES) {
            let validated = validate_with_known_ids(raw, known.as_ref());
            if validated.title.is_empty() {
                tracing::debug!(plan_id = %plan.id, "Skipping suggestion without a title");
                continue;
            }

            // Check-then-insert; two concurrent generations can still both insert
            match store.find_pending_by_title(&plan.id, &validated.title).await {
                Ok(Some(_)) => {
                    tracing::debug!(plan_id = %plan.id, title = %validated.title, "Duplicate suggestion skipped");
                    continue;
                },
                Ok(None) => {},
                Err(e) => {
                    tracing::error!(plan_id = %plan.id, error = %e, "Duplicate check failed");
                    continue;
                },
            }

            match store.insert(&plan.id, user_id, &validated).await {
                Ok(suggestion) => created.push(suggestion),
                Err(e) => {
                    tracing::error!(plan_id = %plan.id, error = %e, "Failed to store suggestion");
                },
            }
        }

        tracing::info!(
            plan_id = %plan.id,
            candidates = candidates.len(),
            created = created.len(),
            "Suggestions generated"
        );
        created
    }
}

fn build_prompt(plan: &Plan, tasks: &[Task]) -> String {
    let context: Vec<Value> = tasks
        .iter()
        .map(|t| {
            json!({
                "id": t.id,
                "title": t.title,
                "description": t.description,
                "status": t.status,
                "estimated_hours": t.estimated_time_hours,
            })
        })
        .collect();
    let tasks_json = serde_json::to_string_pretty(&context).unwrap_or_else(|_| "[]".to_string());

    format!(
        "PLAN: {}\nDESCRIPTION: {}\n\nTASKS:\n{}\n\nGenerate 1-3 high-quality suggestions. Do not suggest things that are already done.",
        plan.title,
        plan.description.as_deref().unwrap_or(""),
        tasks_json
    )
}

/// `{"suggestions": [...]}` or a bare array; None when unparseable
fn extract_candidates(content: &str) -> Option<Vec<Value>> {
    match serde_json::from_str::<Value>(clean_json_response(content)).ok()? {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => match map.remove("suggestions") {
            Some(Value::Array(items)) => Some(items),
            _ => Some(Vec::new()),
        },
        _ => None,
    }
}
