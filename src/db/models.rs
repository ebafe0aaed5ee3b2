use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PlanStatus {
    Draft,
    Active,
    Completed,
    Archived,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Draft => "draft",
            PlanStatus::Active => "active",
            PlanStatus::Completed => "completed",
            PlanStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(PlanStatus::Draft),
            "active" => Some(PlanStatus::Active),
            "completed" => Some(PlanStatus::Completed),
            "archived" => Some(PlanStatus::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ResourceType {
    Link,
    Document,
    Video,
    Other,
}

impl ResourceType {
    /// Unknown resource kinds coming from the LLM are stored as `other`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "link" => ResourceType::Link,
            "document" => ResourceType::Document,
            "video" => ResourceType::Video,
            _ => ResourceType::Other,
        }
    }
}

/// Kind of proactive suggestion. Determines what accepting it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SuggestionType {
    NextTask,
    AddTask,
    Optimize,
    Warning,
    Breakdown,
}

impl SuggestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionType::NextTask => "next_task",
            SuggestionType::AddTask => "add_task",
            SuggestionType::Optimize => "optimize",
            SuggestionType::Warning => "warning",
            SuggestionType::Breakdown => "breakdown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SuggestionPriority {
    Low,
    Medium,
    High,
}

impl SuggestionPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionPriority::Low => "low",
            SuggestionPriority::Medium => "medium",
            SuggestionPriority::High => "high",
        }
    }
}

/// Suggestion lifecycle. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Pending,
    Accepted,
    Rejected,
    Dismissed,
}

impl SuggestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionStatus::Pending => "pending",
            SuggestionStatus::Accepted => "accepted",
            SuggestionStatus::Rejected => "rejected",
            SuggestionStatus::Dismissed => "dismissed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SuggestionStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Plan {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: PlanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_estimated_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_estimated_cost_usd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_score: Option<i64>,
    pub last_analyzed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub plan_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub order: i64,
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_cost_usd: Option<f64>,
    #[serde(default)]
    pub tools_needed: Vec<String>,
    #[serde(default)]
    pub prerequisites: Vec<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn json_column<T: serde::de::DeserializeOwned>(row: &SqliteRow, column: &str) -> sqlx::Result<T> {
    let raw: String = row.try_get(column)?;
    serde_json::from_str(&raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

impl<'r> FromRow<'r, SqliteRow> for Task {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            plan_id: row.try_get("plan_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            status: row.try_get("status")?,
            order: row.try_get("sort_order")?,
            due_date: row.try_get("due_date")?,
            estimated_time_hours: row.try_get("estimated_time_hours")?,
            difficulty: row.try_get("difficulty")?,
            estimated_cost_usd: row.try_get("estimated_cost_usd")?,
            tools_needed: json_column(row, "tools_needed")?,
            prerequisites: json_column(row, "prerequisites")?,
            tags: json_column(row, "tags")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub task_id: String,
    pub title: String,
    pub description: Option<String>,
    pub order: i64,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for Subtask {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            task_id: row.try_get("task_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            order: row.try_get("sort_order")?,
            completed: row.try_get("completed")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Resource {
    pub id: String,
    pub plan_id: String,
    pub title: String,
    pub url: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub resource_type: ResourceType,
    pub created_at: DateTime<Utc>,
}

/// A task proposed by an `add_task` suggestion, already sanitized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Structured directive carried by an `optimize` suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskOperation {
    /// Move `task_id` to sit immediately before `before_task_id`.
    Reorder {
        task_id: String,
        before_task_id: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_tasks: Option<Vec<SuggestedTask>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operations: Option<Vec<TaskOperation>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: String,
    pub plan_id: String,
    pub user_id: String,
    pub suggestion_type: SuggestionType,
    pub priority: SuggestionPriority,
    pub status: SuggestionStatus,
    pub title: String,
    pub description: String,
    pub actionable: bool,
    pub action_button_text: Option<String>,
    pub related_task_ids: Vec<String>,
    pub confidence_score: f64,
    pub reasoning: Option<String>,
    pub metadata: SuggestionMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shown_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for Suggestion {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            plan_id: row.try_get("plan_id")?,
            user_id: row.try_get("user_id")?,
            suggestion_type: row.try_get("suggestion_type")?,
            priority: row.try_get("priority")?,
            status: row.try_get("status")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            actionable: row.try_get("actionable")?,
            action_button_text: row.try_get("action_button_text")?,
            related_task_ids: json_column(row, "related_task_ids")?,
            confidence_score: row.try_get("confidence_score")?,
            reasoning: row.try_get("reasoning")?,
            metadata: json_column(row, "metadata")?,
            shown_at: row.try_get("shown_at")?,
            acted_at: row.try_get("acted_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Plan with its tasks (ordered) and resources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanWithDetails {
    #[serde(flatten)]
    pub plan: Plan,
    pub tasks: Vec<Task>,
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStats {
    pub active: i64,
    pub completed: i64,
    pub archived: i64,
    pub draft: i64,
    pub total: i64,
}

/// Summary of what accepting a suggestion actually did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptOutcome {
    pub suggestion_id: String,
    pub suggestion_type: Option<SuggestionType>,
    pub tasks_created: Vec<String>,
    pub operations_applied: usize,
    pub operations_skipped: usize,
    pub subtasks_created: usize,
    pub targets_skipped: Vec<String>,
}
