use crate::db::models::PlanStatus;
use crate::error::PlanError;
use crate::tasks::{NewTask, ReorderItem};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// API error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Error half of every handler result. Internal failures are logged here
/// and reach the client only as a generic message.
#[derive(Debug)]
pub struct ApiFailure {
    pub status: StatusCode,
    pub error: ApiError,
}

impl ApiFailure {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            error: ApiError {
                code: code.to_string(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }
}

pub fn status_for(error: &PlanError) -> StatusCode {
    match error {
        PlanError::PlanNotFound(_)
        | PlanError::TaskNotFound(_)
        | PlanError::SubtaskNotFound(_)
        | PlanError::SuggestionNotFound(_) => StatusCode::NOT_FOUND,
        PlanError::Forbidden(_) => StatusCode::FORBIDDEN,
        PlanError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        PlanError::ActionNotAllowed(_) => StatusCode::CONFLICT,
        PlanError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        PlanError::LlmError(_) => StatusCode::BAD_GATEWAY,
        PlanError::LlmNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<PlanError> for ApiFailure {
    fn from(error: PlanError) -> Self {
        let status = status_for(&error);
        let code = error.to_error_code();

        if error.is_client_error() {
            let mut failure = Self::new(status, code, error.to_string());
            if let PlanError::RateLimited { remaining } = error {
                failure.error.details = Some(serde_json::json!({ "remaining": remaining }));
            }
            return failure;
        }

        tracing::error!(error = %error, code, "Request failed");
        let message = match error {
            PlanError::LlmError(_) | PlanError::LlmNotConfigured => "AI service unavailable",
            _ => "Internal server error",
        };
        Self::new(status, code, message)
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiFailure>;

/// Query parameters for the plan list
#[derive(Debug, Default, Deserialize)]
pub struct PlanListQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePlanStatusRequest {
    pub status: PlanStatus,
}

/// Create task request; without `order` the task is appended
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    #[serde(flatten)]
    pub task: NewTask,
    #[serde(default)]
    pub order: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderTasksRequest {
    pub items: Vec<ReorderItem>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MoveTaskRequest {
    #[serde(default)]
    pub before_task_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubtaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuggestionQuery {
    #[serde(default)]
    pub force: bool,
}

#[derive(Serialize)]
pub struct ReorderResponse {
    pub updated: usize,
}
