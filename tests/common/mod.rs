//! Shared fixtures for integration tests: a throwaway database, scripted LLM
//! clients and a CLI command bound to an isolated database file.

#![allow(dead_code)]

use assert_cmd::Command;
use async_trait::async_trait;
use plangenie::breakdown::{GeneratedSubtask, SubtaskGenerator};
use plangenie::db::models::{Plan, Task};
use plangenie::db::{create_pool, run_migrations};
use plangenie::error::{PlanError, Result};
use plangenie::llm::{CompletionClient, CompletionRequest};
use plangenie::plans::{NewPlan, PlanManager};
use plangenie::tasks::{NewTask, TaskManager};
use sqlx::SqlitePool;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;

/// Fresh migrated database in a temp dir; keep the `TempDir` alive
pub async fn setup_test_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().unwrap();
    let pool = create_pool(&temp_dir.path().join("plangenie.db")).await.unwrap();
    run_migrations(&pool).await.unwrap();
    (temp_dir, pool)
}

pub async fn create_plan(pool: &SqlitePool, user_id: &str, title: &str) -> Plan {
    PlanManager::new(pool)
        .create_plan(
            user_id,
            NewPlan {
                title: title.to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap()
}

/// Append tasks with the given titles and return them in plan order
pub async fn add_tasks(pool: &SqlitePool, plan_id: &str, titles: &[&str]) -> Vec<Task> {
    let manager = TaskManager::new(pool);
    for title in titles {
        manager
            .add_task(plan_id, NewTask::titled(*title, None))
            .await
            .unwrap();
    }
    manager.list_tasks(plan_id).await.unwrap()
}

pub fn titles(tasks: &[Task]) -> Vec<String> {
    tasks.iter().map(|t| t.title.clone()).collect()
}

/// Replies from a script, one per call; fails once the script runs out
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String>>>,
    calls: Mutex<usize>,
}

impl ScriptedClient {
    pub fn new(replies: Vec<Result<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(0),
        }
    }

    pub fn replying(reply: &str) -> Self {
        Self::new(vec![Ok(reply.to_string())])
    }

    pub fn failing() -> Self {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, _request: CompletionRequest) -> Result<String> {
        *self.calls.lock().unwrap() += 1;
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PlanError::LlmError("no scripted reply".to_string())))
    }
}

/// Generates `count` numbered steps for every task
pub struct CountingSubtaskGenerator {
    pub count: usize,
}

#[async_trait]
impl SubtaskGenerator for CountingSubtaskGenerator {
    async fn generate(&self, task: &Task) -> Result<Vec<GeneratedSubtask>> {
        Ok((1..=self.count)
            .map(|i| GeneratedSubtask {
                title: format!("{} step {}", task.title, i),
                description: String::new(),
            })
            .collect())
    }
}

/// `plangenie` bound to a database file, with LLM env cleared and HOME
/// pointed away from the real one
#[allow(deprecated)]
pub fn plangenie_command(db_path: &Path) -> Command {
    let mut cmd = Command::cargo_bin("plangenie").unwrap();
    cmd.env("HOME", "/nonexistent")
        .env("PLANGENIE_DB_PATH", db_path)
        .env_remove("PLANGENIE_LLM_ENDPOINT")
        .env_remove("PLANGENIE_LLM_API_KEY")
        .env_remove("PLANGENIE_LLM_MODEL")
        .env_remove("RUST_LOG");
    cmd
}
