//! Boundary between raw LLM output and typed suggestions.
//!
//! Everything here is total: malformed input is coerced or dropped, never
//! reported as an error. The only I/O is a read of the plan's task ids.

use crate::db::models::{
    SuggestedTask, SuggestionMetadata, SuggestionPriority, SuggestionType, TaskOperation,
};
use crate::tasks::TaskManager;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::LazyLock;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_TEXT_CHARS: usize = 1000;
pub const MAX_BUTTON_CHARS: usize = 50;
pub const MAX_SUGGESTED_TASKS: usize = 10;
pub const MAX_OPERATIONS: usize = 20;
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

// Best-effort tag removal for display text. Not an HTML sanitizer: it does
// not decode entities and does not handle `>` inside attribute values.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<[^>]+>").expect("tag pattern is valid")
});

static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("uuid pattern is valid")
});

/// What accepting the suggestion will do, with its validated payload
#[derive(Debug, Clone, PartialEq)]
pub enum SuggestionAction {
    AddTask { suggested_tasks: Vec<SuggestedTask> },
    Optimize { operations: Vec<TaskOperation> },
    Breakdown,
    Warning,
}

impl SuggestionAction {
    pub fn suggestion_type(&self) -> SuggestionType {
        match self {
            SuggestionAction::AddTask { .. } => SuggestionType::AddTask,
            SuggestionAction::Optimize { .. } => SuggestionType::Optimize,
            SuggestionAction::Breakdown => SuggestionType::Breakdown,
            SuggestionAction::Warning => SuggestionType::Warning,
        }
    }

    /// Persisted form of the payload
    pub fn metadata(&self) -> SuggestionMetadata {
        match self {
            SuggestionAction::AddTask { suggested_tasks } => SuggestionMetadata {
                suggested_tasks: Some(suggested_tasks.clone()),
                operations: None,
            },
            SuggestionAction::Optimize { operations } => SuggestionMetadata {
                suggested_tasks: None,
                operations: Some(operations.clone()),
            },
            SuggestionAction::Breakdown | SuggestionAction::Warning => {
                SuggestionMetadata::default()
            },
        }
    }
}

/// A suggestion that passed the sanitization boundary and can be stored
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSuggestion {
    pub title: String,
    pub description: String,
    pub priority: SuggestionPriority,
    pub actionable: bool,
    pub action_button_text: Option<String>,
    pub related_task_ids: Vec<String>,
    pub confidence_score: f64,
    pub reasoning: Option<String>,
    pub action: SuggestionAction,
}

impl ValidatedSuggestion {
    pub fn suggestion_type(&self) -> SuggestionType {
        self.action.suggestion_type()
    }
}

pub fn strip_tags(input: &str) -> String {
    TAG_RE.replace_all(input, "").into_owned()
}

/// Strip tags, trim, and cut to at most `max_chars` characters
pub fn bounded_text(input: &str, max_chars: usize) -> String {
    let stripped = strip_tags(input);
    let trimmed = stripped.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((cut, _)) => trimmed[..cut].trim_end().to_string(),
        None => trimmed.to_string(),
    }
}

pub fn is_uuid_shaped(value: &str) -> bool {
    UUID_RE.is_match(value)
}

fn text_field(raw: &Value, key: &str, max_chars: usize) -> String {
    raw.get(key)
        .and_then(Value::as_str)
        .map(|s| bounded_text(s, max_chars))
        .unwrap_or_default()
}

fn optional_text_field(raw: &Value, key: &str, max_chars: usize) -> Option<String> {
    Some(text_field(raw, key, max_chars)).filter(|s| !s.is_empty())
}

/// Generation only produces breakdown/add_task/optimize/warning;
/// anything else, `next_task` included, is downgraded to `warning`.
pub fn coerce_type(raw: Option<&Value>) -> SuggestionType {
    let value = raw
        .and_then(Value::as_str)
        .map(|s| s.trim().to_ascii_lowercase());
    match value.as_deref() {
        Some("breakdown") => SuggestionType::Breakdown,
        Some("add_task") => SuggestionType::AddTask,
        Some("optimize") => SuggestionType::Optimize,
        _ => SuggestionType::Warning,
    }
}

pub fn coerce_priority(raw: Option<&Value>) -> SuggestionPriority {
    let value = raw
        .and_then(Value::as_str)
        .map(|s| s.trim().to_ascii_lowercase());
    match value.as_deref() {
        Some("low") => SuggestionPriority::Low,
        Some("high") => SuggestionPriority::High,
        _ => SuggestionPriority::Medium,
    }
}

/// Numbers and numeric strings are clamped to [0, 1]; everything else,
/// NaN included, becomes 0.5.
pub fn coerce_confidence(raw: Option<&Value>) -> f64 {
    let parsed = match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(score) if !score.is_nan() => score.clamp(0.0, 1.0),
        _ => DEFAULT_CONFIDENCE,
    }
}

/// First 10 entries; non-objects and entries with no usable title dropped
pub fn sanitize_suggested_tasks(raw: Option<&Value>) -> Vec<SuggestedTask> {
    let Some(entries) = raw.and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .take(MAX_SUGGESTED_TASKS)
        .filter(|entry| entry.is_object())
        .map(|entry| SuggestedTask {
            title: text_field(entry, "title", MAX_TITLE_CHARS),
            description: text_field(entry, "description", MAX_TEXT_CHARS),
        })
        .filter(|task| !task.title.is_empty())
        .collect()
}

/// Keep well-formed reorder operations. Task existence is checked when the
/// operation is applied, not here.
pub fn sanitize_operations(raw: Option<&Value>) -> Vec<TaskOperation> {
    let Some(entries) = raw.and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            if entry.get("type").and_then(Value::as_str) != Some("reorder") {
                return None;
            }
            let task_id = entry.get("task_id").and_then(Value::as_str)?.trim();
            let before_task_id = entry.get("before_task_id").and_then(Value::as_str)?.trim();
            if !is_uuid_shaped(task_id) || !is_uuid_shaped(before_task_id) {
                return None;
            }
            Some(TaskOperation::Reorder {
                task_id: task_id.to_ascii_lowercase(),
                before_task_id: before_task_id.to_ascii_lowercase(),
            })
        })
        .take(MAX_OPERATIONS)
        .collect()
}

/// UUID-shaped ids that exist in `known`, first occurrence only, in input
/// order. Ids are lowercased to match stored ones. With no known set every
/// id is dropped.
pub fn filter_related_ids(raw: Option<&Value>, known: Option<&HashSet<String>>) -> Vec<String> {
    let (Some(entries), Some(known)) = (raw.and_then(Value::as_array), known) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    entries
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|id| is_uuid_shaped(id))
        .map(str::to_ascii_lowercase)
        .filter(|id| known.contains(id) && seen.insert(id.clone()))
        .collect()
}

/// Pure validation against an already-fetched set of the plan's task ids
pub fn validate_with_known_ids(raw: &Value, known: Option<&HashSet<String>>) -> ValidatedSuggestion {
    let metadata = raw.get("metadata");

    let action = match coerce_type(raw.get("suggestion_type")) {
        SuggestionType::AddTask => SuggestionAction::AddTask {
            suggested_tasks: sanitize_suggested_tasks(
                metadata.and_then(|m| m.get("suggested_tasks")),
            ),
        },
        SuggestionType::Optimize => SuggestionAction::Optimize {
            operations: sanitize_operations(metadata.and_then(|m| m.get("operations"))),
        },
        SuggestionType::Breakdown => SuggestionAction::Breakdown,
        _ => SuggestionAction::Warning,
    };

    ValidatedSuggestion {
        title: text_field(raw, "title", MAX_TITLE_CHARS),
        description: text_field(raw, "description", MAX_TEXT_CHARS),
        priority: coerce_priority(raw.get("priority")),
        actionable: raw.get("actionable").and_then(Value::as_bool).unwrap_or(true),
        action_button_text: optional_text_field(raw, "action_button_text", MAX_BUTTON_CHARS),
        related_task_ids: filter_related_ids(raw.get("related_task_ids"), known),
        confidence_score: coerce_confidence(raw.get("confidence_score")),
        reasoning: optional_text_field(raw, "reasoning", MAX_TEXT_CHARS),
        action,
    }
}

/// Validate one raw candidate for `plan_id`. Never fails; if the task id
/// lookup fails, all related ids are dropped.
pub async fn validate_suggestion(
    raw: &Value,
    plan_id: &str,
    tasks: &TaskManager<'_>,
) -> ValidatedSuggestion {
    let known = match tasks.task_ids_for_plan(plan_id).await {
        Ok(ids) => Some(ids),
        Err(e) => {
            tracing::warn!(plan_id, error = %e, "Task id lookup failed, dropping related ids");
            None
        },
    };

    validate_with_known_ids(raw, known.as_ref())
}
