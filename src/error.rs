use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Plan not found: {0}")]
    PlanNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Subtask not found: {0}")]
    SubtaskNotFound(String),

    #[error("Suggestion not found: {0}")]
    SuggestionNotFound(String),

    #[error("Not authorized: {0}")]
    Forbidden(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Action not allowed: {0}")]
    ActionNotAllowed(String),

    #[error("Rate limit exceeded, {remaining} generation(s) remaining in the current window")]
    RateLimited { remaining: u32 },

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("LLM not configured")]
    LlmNotConfigured,

    #[error(transparent)]
    OtherError(#[from] anyhow::Error),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl PlanError {
    pub fn to_error_code(&self) -> &'static str {
        match self {
            PlanError::PlanNotFound(_) => "PLAN_NOT_FOUND",
            PlanError::TaskNotFound(_) => "TASK_NOT_FOUND",
            PlanError::SubtaskNotFound(_) => "SUBTASK_NOT_FOUND",
            PlanError::SuggestionNotFound(_) => "SUGGESTION_NOT_FOUND",
            PlanError::Forbidden(_) => "FORBIDDEN",
            PlanError::DatabaseError(_) => "DATABASE_ERROR",
            PlanError::InvalidInput(_) => "INVALID_INPUT",
            PlanError::ActionNotAllowed(_) => "ACTION_NOT_ALLOWED",
            PlanError::RateLimited { .. } => "RATE_LIMITED",
            PlanError::LlmError(_) => "LLM_ERROR",
            PlanError::LlmNotConfigured => "LLM_NOT_CONFIGURED",
            _ => "INTERNAL_ERROR",
        }
    }

    /// Whether this error describes a caller mistake (safe to show verbatim)
    /// rather than an internal failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PlanError::PlanNotFound(_)
                | PlanError::TaskNotFound(_)
                | PlanError::SubtaskNotFound(_)
                | PlanError::SuggestionNotFound(_)
                | PlanError::Forbidden(_)
                | PlanError::InvalidInput(_)
                | PlanError::ActionNotAllowed(_)
                | PlanError::RateLimited { .. }
        )
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
            code: self.to_error_code().to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PlanError>;
