//! HTTP API through the full router, without binding a socket

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{add_tasks, create_plan, setup_test_db, CountingSubtaskGenerator, ScriptedClient};
use http_body_util::BodyExt;
use plangenie::error::Result;
use plangenie::server::{create_router, AppState};
use plangenie::suggestions::{InMemoryRateLimiter, SystemClock};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower::ServiceExt;

fn app(pool: &SqlitePool, replies: Vec<Result<String>>, max_generations: u32) -> Router {
    create_router(AppState {
        db_pool: pool.clone(),
        llm: Arc::new(ScriptedClient::new(replies)),
        limiter: Arc::new(InMemoryRateLimiter::new(
            max_generations,
            3600,
            Arc::new(SystemClock),
        )),
        subtask_generator: Arc::new(CountingSubtaskGenerator { count: 4 }),
    })
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("X-User-Id", user);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health_needs_no_user() {
    let (_dir, pool) = setup_test_db().await;
    let app = app(&pool, Vec::new(), 5);

    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_missing_user_header_is_unauthorized() {
    let (_dir, pool) = setup_test_db().await;
    let app = app(&pool, Vec::new(), 5);

    let (status, body) = send(&app, "GET", "/api/plans", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let (_dir, pool) = setup_test_db().await;
    let app = app(&pool, Vec::new(), 5);

    let (status, body) = send(&app, "GET", "/api/nothing-here", Some("u1"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_generate_plan_and_ownership() {
    let (_dir, pool) = setup_test_db().await;
    // No scripted reply: the template plan is used
    let app = app(&pool, Vec::new(), 5);

    let (status, body) = send(
        &app,
        "POST",
        "/api/plans/generate",
        Some("u1"),
        Some(json!({"goal": "Trip to Udaipur", "timeline": "2 weeks"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let plan_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["plan_type"], "travel");
    assert_eq!(body["data"]["tasks"].as_array().unwrap().len(), 8);
    assert_eq!(body["data"]["health_score"], 75);

    let uri = format!("/api/plans/{}", plan_id);
    let (status, body) = send(&app, "GET", &uri, Some("u2"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, body) = send(&app, "GET", &uri, Some("u1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["resources"].as_array().unwrap().len(), 8);

    let (_, body) = send(&app, "GET", "/api/plans", Some("u1"), None).await;
    assert_eq!(body["data"]["total"], 1);
    let (_, body) = send(&app, "GET", "/api/plans", Some("u2"), None).await;
    assert_eq!(body["data"]["total"], 0);

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("{}/status", uri),
        Some("u1"),
        Some(json!({"status": "completed"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, "GET", "/api/plans/stats", Some("u1"), None).await;
    assert_eq!(body["data"]["completed"], 1);

    let (status, _) = send(&app, "DELETE", &uri, Some("u1"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = send(&app, "GET", &uri, Some("u1"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "PLAN_NOT_FOUND");
}

#[tokio::test]
async fn test_list_plans_rejects_unknown_status() {
    let (_dir, pool) = setup_test_db().await;
    let app = app(&pool, Vec::new(), 5);

    let (status, body) = send(&app, "GET", "/api/plans?status=sleeping", Some("u1"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_task_create_move_update_delete() {
    let (_dir, pool) = setup_test_db().await;
    let plan = create_plan(&pool, "u1", "Plan").await;
    let tasks = add_tasks(&pool, &plan.id, &["A", "B"]).await;
    let app = app(&pool, Vec::new(), 5);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/plans/{}/tasks", plan.id),
        Some("u1"),
        Some(json!({"title": "C", "difficulty": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["order"], 3);
    let c_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/tasks/{}/move", c_id),
        Some("u1"),
        Some(json!({"before_task_id": tasks[0].id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let order: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap())
        .collect();
    assert_eq!(order, vec!["C", "A", "B"]);

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/tasks/{}", c_id),
        Some("u1"),
        Some(json!({"status": "completed"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "completed");

    let (status, _) = send(&app, "DELETE", &format!("/api/tasks/{}", c_id), Some("u2"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, "DELETE", &format!("/api/tasks/{}", c_id), Some("u1"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_invalid_task_is_bad_request() {
    let (_dir, pool) = setup_test_db().await;
    let plan = create_plan(&pool, "u1", "Plan").await;
    let app = app(&pool, Vec::new(), 5);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/plans/{}/tasks", plan.id),
        Some("u1"),
        Some(json!({"title": "Hard", "difficulty": 9})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_extreme_order_and_page_are_bad_requests() {
    let (_dir, pool) = setup_test_db().await;
    let plan = create_plan(&pool, "u1", "Plan").await;
    let app = app(&pool, Vec::new(), 5);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/plans/{}/tasks", plan.id),
        Some("u1"),
        Some(json!({"title": "Far", "order": i64::MAX})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/plans?page={}", i64::MAX),
        Some("u1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_bulk_reorder_checks_ownership() {
    let (_dir, pool) = setup_test_db().await;
    let mine = create_plan(&pool, "u1", "Mine").await;
    let theirs = create_plan(&pool, "u2", "Theirs").await;
    let my_tasks = add_tasks(&pool, &mine.id, &["A", "B"]).await;
    let their_tasks = add_tasks(&pool, &theirs.id, &["X"]).await;
    let app = app(&pool, Vec::new(), 5);

    let (status, _) = send(
        &app,
        "POST",
        "/api/tasks/reorder",
        Some("u1"),
        Some(json!({"items": [
            {"task_id": my_tasks[0].id, "new_order": 2},
            {"task_id": their_tasks[0].id, "new_order": 1},
        ]})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "POST",
        "/api/tasks/reorder",
        Some("u1"),
        Some(json!({"items": [
            {"task_id": my_tasks[0].id, "new_order": 2},
            {"task_id": my_tasks[1].id, "new_order": 1},
        ]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["updated"], 2);
}

#[tokio::test]
async fn test_subtask_endpoints() {
    let (_dir, pool) = setup_test_db().await;
    let plan = create_plan(&pool, "u1", "Plan").await;
    let tasks = add_tasks(&pool, &plan.id, &["Book hotel"]).await;
    let app = app(&pool, Vec::new(), 5);
    let base = format!("/api/tasks/{}/subtasks", tasks[0].id);

    let (status, body) = send(&app, "POST", &format!("{}/generate", base), Some("u1"), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"].as_array().unwrap().len(), 4);

    let (status, body) = send(
        &app,
        "POST",
        &base,
        Some("u1"),
        Some(json!({"title": "Pay deposit"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["order"], 5);
    let subtask_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/subtasks/{}", subtask_id),
        Some("u1"),
        Some(json!({"completed": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["completed"], true);

    let (status, _) = send(&app, "DELETE", &format!("/api/subtasks/{}", subtask_id), Some("u2"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, "DELETE", &format!("/api/subtasks/{}", subtask_id), Some("u1"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&app, "GET", &base, Some("u1"), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_suggestions_cache_rate_limit_and_accept() {
    let (_dir, pool) = setup_test_db().await;
    let plan = create_plan(&pool, "u1", "Trip").await;
    add_tasks(&pool, &plan.id, &["Book flights"]).await;
    let reply = json!({"suggestions": [{
        "title": "Buy insurance",
        "suggestion_type": "add_task",
        "metadata": {"suggested_tasks": [{"title": "Compare insurers"}]},
    }]})
    .to_string();
    let app = app(&pool, vec![Ok(reply)], 1);
    let uri = format!("/api/plans/{}/suggestions", plan.id);

    let (status, body) = send(&app, "GET", &uri, Some("u1"), None).await;
    assert_eq!(status, StatusCode::OK);
    let suggestions = body["data"].as_array().unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0]["suggestion_type"], "add_task");
    let suggestion_id = suggestions[0]["id"].as_str().unwrap().to_string();

    // Served from cache, no generation needed
    let (status, _) = send(&app, "GET", &uri, Some("u1"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", &format!("{}?force=true", uri), Some("u1"), None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "RATE_LIMITED");
    assert_eq!(body["details"]["remaining"], 0);

    let accept = format!("/api/suggestions/{}/accept", suggestion_id);
    let (status, _) = send(&app, "POST", &accept, Some("u2"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "POST", &accept, Some("u1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["tasks_created"].as_array().unwrap().len(), 1);

    let (status, body) = send(&app, "POST", &accept, Some("u1"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ACTION_NOT_ALLOWED");
}

#[tokio::test]
async fn test_dismiss_suggestion() {
    let (_dir, pool) = setup_test_db().await;
    let plan = create_plan(&pool, "u1", "Trip").await;
    let reply = json!({"suggestions": [{"title": "Check visa"}]}).to_string();
    let app = app(&pool, vec![Ok(reply)], 5);

    let (_, body) = send(&app, "GET", &format!("/api/plans/{}/suggestions", plan.id), Some("u1"), None).await;
    let suggestion_id = body["data"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/suggestions/{}/dismiss", suggestion_id),
        Some("u1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "dismissed");
    assert!(body["data"]["acted_at"].is_string());
}

#[tokio::test]
async fn test_reject_suggestion() {
    let (_dir, pool) = setup_test_db().await;
    let plan = create_plan(&pool, "u1", "Trip").await;
    let reply = json!({"suggestions": [{"title": "Skip the museum"}]}).to_string();
    let app = app(&pool, vec![Ok(reply)], 5);

    let (_, body) = send(&app, "GET", &format!("/api/plans/{}/suggestions", plan.id), Some("u1"), None).await;
    let suggestion_id = body["data"][0]["id"].as_str().unwrap().to_string();
    let reject = format!("/api/suggestions/{}/reject", suggestion_id);

    let (status, _) = send(&app, "POST", &reject, Some("u2"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "POST", &reject, Some("u1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "rejected");

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/suggestions/{}/accept", suggestion_id),
        Some("u1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ACTION_NOT_ALLOWED");
}
