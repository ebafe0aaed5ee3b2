#[cfg(test)]
pub mod test_helpers {
    use crate::breakdown::{GeneratedSubtask, SubtaskGenerator};
    use crate::db::models::{Plan, Task};
    use crate::db::{create_pool, run_migrations};
    use crate::error::{PlanError, Result};
    use crate::llm::{CompletionClient, CompletionRequest};
    use crate::plans::{NewPlan, PlanManager};
    use crate::tasks::{NewTask, TaskManager};
    use async_trait::async_trait;
    use sqlx::SqlitePool;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tempfile::TempDir;

    pub struct TestContext {
        pub pool: SqlitePool,
        pub _temp_dir: TempDir,
    }

    impl TestContext {
        pub async fn new() -> Self {
            let temp_dir = TempDir::new().unwrap();
            let db_path = temp_dir.path().join("plangenie.db");

            let pool = create_pool(&db_path).await.unwrap();
            run_migrations(&pool).await.unwrap();

            Self {
                pool,
                _temp_dir: temp_dir,
            }
        }

        pub fn pool(&self) -> &SqlitePool {
            &self.pool
        }

        pub async fn create_plan(&self, user_id: &str, title: &str) -> Plan {
            PlanManager::new(&self.pool)
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

        /// New plan holding a single task
        pub async fn create_task(&self, user_id: &str, plan_title: &str, title: &str) -> Task {
            let plan = self.create_plan(user_id, plan_title).await;
            TaskManager::new(&self.pool)
                .add_task(&plan.id, NewTask::titled(title, None))
                .await
                .unwrap()
        }
    }

    /// Completion client returning a canned reply and recording requests
    pub struct StaticCompletionClient {
        reply: Option<String>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl StaticCompletionClient {
        pub fn ok(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn failing() -> Self {
            Self {
                reply: None,
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn last_request(&self) -> Option<CompletionRequest> {
            self.requests.lock().unwrap().last().cloned()
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionClient for StaticCompletionClient {
        async fn complete(&self, request: CompletionRequest) -> Result<String> {
            self.requests.lock().unwrap().push(request);
            self.reply
                .clone()
                .ok_or_else(|| PlanError::LlmError("connection refused".to_string()))
        }
    }

    /// Subtask generator with fixed output; fails for listed task titles
    pub struct FixedSubtaskGenerator {
        pub subtasks: Vec<GeneratedSubtask>,
        pub fail_for: HashSet<String>,
    }

    impl FixedSubtaskGenerator {
        pub fn with_count(count: usize) -> Self {
            Self {
                subtasks: (1..=count)
                    .map(|i| GeneratedSubtask {
                        title: format!("Step {}", i),
                        description: String::new(),
                    })
                    .collect(),
                fail_for: HashSet::new(),
            }
        }
    }

    #[async_trait]
    impl SubtaskGenerator for FixedSubtaskGenerator {
        async fn generate(&self, task: &Task) -> Result<Vec<GeneratedSubtask>> {
            if self.fail_for.contains(&task.title) {
                return Err(PlanError::LlmError("generation failed".to_string()));
            }
            Ok(self.subtasks.clone())
        }
    }
}
