use axum::{
    routing::{get, patch, post},
    Router,
};

use super::handlers;
use super::app::AppState;

/// API router; mounted under `/api`
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Plans
        .route("/plans", get(handlers::list_plans))
        .route("/plans/stats", get(handlers::plan_stats))
        .route("/plans/generate", post(handlers::generate_plan))
        .route(
            "/plans/:id",
            get(handlers::get_plan).delete(handlers::delete_plan),
        )
        .route("/plans/:id/status", patch(handlers::update_plan_status))
        .route("/plans/:id/tasks", post(handlers::create_task))
        .route("/plans/:id/suggestions", get(handlers::list_suggestions))
        // Tasks
        .route("/tasks/reorder", post(handlers::reorder_tasks))
        .route(
            "/tasks/:id",
            patch(handlers::update_task).delete(handlers::delete_task),
        )
        .route("/tasks/:id/move", post(handlers::move_task))
        .route(
            "/tasks/:id/subtasks",
            get(handlers::list_subtasks).post(handlers::create_subtask),
        )
        .route("/tasks/:id/subtasks/generate", post(handlers::generate_subtasks))
        // Subtasks
        .route(
            "/subtasks/:id",
            patch(handlers::update_subtask).delete(handlers::delete_subtask),
        )
        // Suggestions
        .route("/suggestions/:id/accept", post(handlers::accept_suggestion))
        .route("/suggestions/:id/dismiss", post(handlers::dismiss_suggestion))
        .route("/suggestions/:id/reject", post(handlers::reject_suggestion))
}
