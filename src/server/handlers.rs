use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use sqlx::SqlitePool;

use super::auth::UserId;
use super::models::*;
use super::app::AppState;
use crate::breakdown::fallback_subtasks;
use crate::db::models::{Plan, PlanStatus, Subtask, Task};
use crate::error::{PlanError, Result};
use crate::plan_generator::{PlanGenerator, PlanRequest};
use crate::plans::PlanManager;
use crate::subtasks::{SubtaskManager, SubtaskUpdate};
use crate::suggestions::executor::MAX_BREAKDOWN_SUBTASKS;
use crate::suggestions::validation::{bounded_text, MAX_TEXT_CHARS, MAX_TITLE_CHARS};
use crate::suggestions::{fetch_suggestions, ActionExecutor, SuggestionStore};
use crate::tasks::{TaskManager, TaskUpdate};

fn ok<T: serde::Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { data })
}

fn created<T: serde::Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, ok(data))
}

async fn owned_plan(pool: &SqlitePool, plan_id: &str, user: &UserId) -> Result<Plan> {
    PlanManager::new(pool).verify_ownership(plan_id, user.as_str()).await
}

async fn owned_task(pool: &SqlitePool, task_id: &str, user: &UserId) -> Result<Task> {
    let task = TaskManager::new(pool).get_task(task_id).await?;
    owned_plan(pool, &task.plan_id, user).await?;
    Ok(task)
}

async fn owned_subtask(pool: &SqlitePool, subtask_id: &str, user: &UserId) -> Result<Subtask> {
    let subtask = SubtaskManager::new(pool).get_subtask(subtask_id).await?;
    owned_task(pool, &subtask.task_id, user).await?;
    Ok(subtask)
}

// ---- plans ----

pub async fn list_plans(
    State(state): State<AppState>,
    user: UserId,
    Query(query): Query<PlanListQuery>,
) -> ApiResult<impl IntoResponse> {
    let status = match query.status.as_deref() {
        None | Some("") | Some("all") => None,
        Some(s) => Some(PlanStatus::parse(s).ok_or_else(|| {
            PlanError::InvalidInput(format!("Unknown plan status '{}'", s))
        })?),
    };

    let plans = PlanManager::new(&state.db_pool)
        .list_plans(user.as_str(), status, query.page, query.limit)
        .await?;
    Ok(ok(plans))
}

pub async fn plan_stats(State(state): State<AppState>, user: UserId) -> ApiResult<impl IntoResponse> {
    let stats = PlanManager::new(&state.db_pool).plan_stats(user.as_str()).await?;
    Ok(ok(stats))
}

pub async fn generate_plan(
    State(state): State<AppState>,
    user: UserId,
    Json(req): Json<PlanRequest>,
) -> ApiResult<impl IntoResponse> {
    let details = PlanGenerator::new(&state.db_pool, state.llm.as_ref())
        .create_plan(user.as_str(), &req)
        .await?;
    Ok(created(details))
}

pub async fn get_plan(
    State(state): State<AppState>,
    user: UserId,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    owned_plan(&state.db_pool, &id, &user).await?;
    let details = PlanManager::new(&state.db_pool).get_plan_with_details(&id).await?;
    Ok(ok(details))
}

pub async fn delete_plan(
    State(state): State<AppState>,
    user: UserId,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    owned_plan(&state.db_pool, &id, &user).await?;
    PlanManager::new(&state.db_pool).delete_plan(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_plan_status(
    State(state): State<AppState>,
    user: UserId,
    Path(id): Path<String>,
    Json(req): Json<UpdatePlanStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    owned_plan(&state.db_pool, &id, &user).await?;
    let plan = PlanManager::new(&state.db_pool).update_status(&id, req.status).await?;
    Ok(ok(plan))
}

// ---- tasks ----

pub async fn create_task(
    State(state): State<AppState>,
    user: UserId,
    Path(plan_id): Path<String>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<impl IntoResponse> {
    owned_plan(&state.db_pool, &plan_id, &user).await?;
    let tasks = TaskManager::new(&state.db_pool);
    let task = match req.order {
        Some(order) => tasks.add_task_at(&plan_id, req.task, order).await?,
        None => tasks.add_task(&plan_id, req.task).await?,
    };
    Ok(created(task))
}

pub async fn update_task(
    State(state): State<AppState>,
    user: UserId,
    Path(id): Path<String>,
    Json(update): Json<TaskUpdate>,
) -> ApiResult<impl IntoResponse> {
    owned_task(&state.db_pool, &id, &user).await?;
    let task = TaskManager::new(&state.db_pool).update_task(&id, update).await?;
    Ok(ok(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    user: UserId,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    owned_task(&state.db_pool, &id, &user).await?;
    TaskManager::new(&state.db_pool).delete_task(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Explicit order values; every task must belong to one of the caller's plans
pub async fn reorder_tasks(
    State(state): State<AppState>,
    user: UserId,
    Json(req): Json<ReorderTasksRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.items.is_empty() {
        return Err(PlanError::InvalidInput("No tasks to reorder".to_string()).into());
    }
    for item in &req.items {
        owned_task(&state.db_pool, &item.task_id, &user).await?;
    }
    let updated = TaskManager::new(&state.db_pool).bulk_reorder(&req.items).await?;
    Ok(ok(ReorderResponse { updated }))
}

/// Move a task before another one and return the plan's tasks in new order
pub async fn move_task(
    State(state): State<AppState>,
    user: UserId,
    Path(id): Path<String>,
    Json(req): Json<MoveTaskRequest>,
) -> ApiResult<impl IntoResponse> {
    let task = owned_task(&state.db_pool, &id, &user).await?;
    let tasks = TaskManager::new(&state.db_pool);
    tasks
        .move_task(&task.plan_id, &task.id, req.before_task_id.as_deref())
        .await?;
    Ok(ok(tasks.list_tasks(&task.plan_id).await?))
}

// ---- subtasks ----

pub async fn list_subtasks(
    State(state): State<AppState>,
    user: UserId,
    Path(task_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    owned_task(&state.db_pool, &task_id, &user).await?;
    let subtasks = SubtaskManager::new(&state.db_pool).list_subtasks(&task_id).await?;
    Ok(ok(subtasks))
}

pub async fn create_subtask(
    State(state): State<AppState>,
    user: UserId,
    Path(task_id): Path<String>,
    Json(req): Json<CreateSubtaskRequest>,
) -> ApiResult<impl IntoResponse> {
    owned_task(&state.db_pool, &task_id, &user).await?;
    let subtasks = SubtaskManager::new(&state.db_pool);
    let description = req.description.as_deref();
    let subtask = match req.order {
        Some(order) => subtasks.add_subtask_at(&task_id, &req.title, description, order).await?,
        None => subtasks.add_subtask(&task_id, &req.title, description).await?,
    };
    Ok(created(subtask))
}

/// Append generated subtasks to a task. Falls back to four generic steps
/// when the generator fails.
pub async fn generate_subtasks(
    State(state): State<AppState>,
    user: UserId,
    Path(task_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let task = owned_task(&state.db_pool, &task_id, &user).await?;

    let generated = match state.subtask_generator.generate(&task).await {
        Ok(generated) => generated,
        Err(e) => {
            tracing::warn!(task_id = %task.id, error = %e, "Subtask generation failed, using generic steps");
            fallback_subtasks(&task.title)
        },
    };

    let subtasks = SubtaskManager::new(&state.db_pool);
    let mut created_subtasks = Vec::new();
    for entry in generated.into_iter().take(MAX_BREAKDOWN_SUBTASKS) {
        let title = bounded_text(&entry.title, MAX_TITLE_CHARS);
        if title.is_empty() {
            continue;
        }
        let description = bounded_text(&entry.description, MAX_TEXT_CHARS);
        let description = Some(description.as_str()).filter(|d| !d.is_empty());
        created_subtasks.push(subtasks.add_subtask(&task.id, &title, description).await?);
    }

    tracing::info!(task_id = %task.id, count = created_subtasks.len(), "Subtasks generated");
    Ok(created(created_subtasks))
}

pub async fn update_subtask(
    State(state): State<AppState>,
    user: UserId,
    Path(id): Path<String>,
    Json(update): Json<SubtaskUpdate>,
) -> ApiResult<impl IntoResponse> {
    owned_subtask(&state.db_pool, &id, &user).await?;
    let subtask = SubtaskManager::new(&state.db_pool).update_subtask(&id, update).await?;
    Ok(ok(subtask))
}

pub async fn delete_subtask(
    State(state): State<AppState>,
    user: UserId,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    owned_subtask(&state.db_pool, &id, &user).await?;
    SubtaskManager::new(&state.db_pool).delete_subtask(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- suggestions ----

pub async fn list_suggestions(
    State(state): State<AppState>,
    user: UserId,
    Path(plan_id): Path<String>,
    Query(query): Query<SuggestionQuery>,
) -> ApiResult<impl IntoResponse> {
    let plan = owned_plan(&state.db_pool, &plan_id, &user).await?;
    let suggestions = fetch_suggestions(
        &state.db_pool,
        state.llm.as_ref(),
        state.limiter.as_ref(),
        &plan,
        user.as_str(),
        query.force,
    )
    .await?;
    Ok(ok(suggestions))
}

pub async fn accept_suggestion(
    State(state): State<AppState>,
    user: UserId,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let suggestion = SuggestionStore::new(&state.db_pool).get(&id).await?;
    owned_plan(&state.db_pool, &suggestion.plan_id, &user).await?;

    let outcome = ActionExecutor::new(&state.db_pool, state.subtask_generator.as_ref())
        .accept_suggestion(&id)
        .await?;
    Ok(ok(outcome))
}

pub async fn dismiss_suggestion(
    State(state): State<AppState>,
    user: UserId,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let store = SuggestionStore::new(&state.db_pool);
    let suggestion = store.get(&id).await?;
    owned_plan(&state.db_pool, &suggestion.plan_id, &user).await?;

    store.dismiss(&id).await?;
    Ok(ok(store.get(&id).await?))
}

pub async fn reject_suggestion(
    State(state): State<AppState>,
    user: UserId,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let store = SuggestionStore::new(&state.db_pool);
    let suggestion = store.get(&id).await?;
    owned_plan(&state.db_pool, &suggestion.plan_id, &user).await?;

    store.reject(&id).await?;
    Ok(ok(store.get(&id).await?))
}
