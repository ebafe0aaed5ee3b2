use crate::db::models::Task;
use crate::error::{PlanError, Result};
use crate::llm::{clean_json_response, CompletionClient, CompletionRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You are an expert at breaking down tasks into clear, actionable steps. \
Each subtask should be specific enough that someone knows exactly what to do.";

/// One proposed subtask, before sanitization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedSubtask {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Splits a task into ordered, checkable steps
#[async_trait]
pub trait SubtaskGenerator: Send + Sync {
    async fn generate(&self, task: &Task) -> Result<Vec<GeneratedSubtask>>;
}

/// LLM-backed generator asking for 4-8 steps
pub struct LlmSubtaskGenerator {
    client: Arc<dyn CompletionClient>,
}

impl LlmSubtaskGenerator {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }
}

fn build_prompt(task: &Task) -> String {
    format!(
        r#"Break down this task into 4-8 actionable subtasks that someone can check off one by one.

Task: {}
Description: {}

Subtasks must be specific and actionable (each done in one sitting of 15-60 minutes),
listed in the order they should be done, and unambiguous.

Bad: "Research options" (too vague), "Complete the booking" (too broad).
Good: "Compare top 5 hotels by price, ratings, and location".

Return JSON with this structure:
{{
    "subtasks": [
        {{"title": "Specific action-oriented title", "description": "Optional one-sentence clarification"}}
    ]
}}"#,
        task.title,
        task.description.as_deref().unwrap_or("(none)")
    )
}

/// Accepts `{"subtasks": [...]}` or a bare array. Entries that are not
/// objects with a string title are skipped.
pub fn parse_subtasks(content: &str) -> Result<Vec<GeneratedSubtask>> {
    let value: Value = serde_json::from_str(clean_json_response(content))?;
    let entries: &[Value] = match &value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("subtasks") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };

    let subtasks: Vec<GeneratedSubtask> = entries
        .iter()
        .filter_map(|entry| {
            let title = entry.get("title")?.as_str()?.to_string();
            let description = entry
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Some(GeneratedSubtask { title, description })
        })
        .collect();

    if subtasks.is_empty() {
        return Err(PlanError::LlmError(
            "LLM response contained no subtasks".to_string(),
        ));
    }
    Ok(subtasks)
}

#[async_trait]
impl SubtaskGenerator for LlmSubtaskGenerator {
    async fn generate(&self, task: &Task) -> Result<Vec<GeneratedSubtask>> {
        let request = CompletionRequest::new(build_prompt(task))
            .with_system(SYSTEM_PROMPT)
            .with_temperature(0.7)
            .with_max_tokens(800)
            .json();

        let content = self.client.complete(request).await?;
        parse_subtasks(&content)
    }
}

/// Four generic steps, used when the LLM is unavailable
pub fn fallback_subtasks(task_title: &str) -> Vec<GeneratedSubtask> {
    [
        (
            format!("Step 1: Start with {}", task_title.to_lowercase()),
            "Begin working on this task",
        ),
        (
            "Step 2: Gather required information and resources".to_string(),
            "Collect everything needed",
        ),
        (
            "Step 3: Execute the main action".to_string(),
            "Complete the core part of the task",
        ),
        (
            "Step 4: Verify and finalize".to_string(),
            "Review and confirm completion",
        ),
    ]
    .into_iter()
    .map(|(title, description)| GeneratedSubtask {
        title,
        description: description.to_string(),
    })
    .collect()
}
