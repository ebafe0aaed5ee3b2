use crate::breakdown::SubtaskGenerator;
use crate::db::models::{
    AcceptOutcome, SuggestedTask, Suggestion, SuggestionType, TaskOperation,
};
use crate::error::{PlanError, Result};
use crate::subtasks::SubtaskManager;
use crate::suggestions::store::SuggestionStore;
use crate::suggestions::validation::{bounded_text, MAX_TEXT_CHARS, MAX_TITLE_CHARS};
use crate::tasks::{NewTask, TaskManager};
use sqlx::SqlitePool;

/// Order given to tasks created by an accepted `add_task` suggestion. Puts
/// them after normally numbered tasks; exact position among equal orders
/// follows creation time.
pub const ADD_TASK_SENTINEL_ORDER: i64 = 999;

pub const MAX_BREAKDOWN_SUBTASKS: usize = 20;

/// Applies the structured action behind a suggestion to the task graph
pub struct ActionExecutor<'a> {
    pool: &'a SqlitePool,
    subtask_generator: &'a dyn SubtaskGenerator,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(pool: &'a SqlitePool, subtask_generator: &'a dyn SubtaskGenerator) -> Self {
        Self {
            pool,
            subtask_generator,
        }
    }

    /// Execute the suggestion's action, then mark it accepted.
    ///
    /// The suggestion is marked accepted whenever the action itself returns,
    /// even if individual tasks or breakdown targets were skipped; the
    /// outcome reports what was actually done.
    pub async fn accept_suggestion(&self, id: &str) -> Result<AcceptOutcome> {
        let store = SuggestionStore::new(self.pool);
        let suggestion = store.get(id).await?;

        if suggestion.status.is_terminal() {
            return Err(PlanError::ActionNotAllowed(format!(
                "Suggestion {} is already {}",
                id,
                suggestion.status.as_str()
            )));
        }

        let mut outcome = AcceptOutcome {
            suggestion_id: suggestion.id.clone(),
            suggestion_type: Some(suggestion.suggestion_type),
            ..Default::default()
        };

        match suggestion.suggestion_type {
            SuggestionType::AddTask => self.apply_add_task(&suggestion, &mut outcome).await,
            SuggestionType::Optimize => self.apply_optimize(&suggestion, &mut outcome).await?,
            SuggestionType::Breakdown => self.apply_breakdown(&suggestion, &mut outcome).await,
            SuggestionType::Warning | SuggestionType::NextTask => {},
        }

        store.mark_accepted(id).await?;

        tracing::info!(
            suggestion_id = id,
            suggestion_type = suggestion.suggestion_type.as_str(),
            tasks_created = outcome.tasks_created.len(),
            operations_applied = outcome.operations_applied,
            subtasks_created = outcome.subtasks_created,
            "Suggestion accepted"
        );
        Ok(outcome)
    }

    async fn apply_add_task(&self, suggestion: &Suggestion, outcome: &mut AcceptOutcome) {
        let proposed = match suggestion.metadata.suggested_tasks.as_deref() {
            Some(tasks) if !tasks.is_empty() => tasks.to_vec(),
            _ => vec![SuggestedTask {
                title: format!("New Task: {}", suggestion.title),
                description: suggestion.description.clone(),
            }],
        };

        let tasks = TaskManager::new(self.pool);
        for proposal in proposed {
            let description = Some(proposal.description).filter(|d| !d.is_empty());
            let new_task = NewTask::titled(proposal.title, description);

            match tasks
                .add_task_at(&suggestion.plan_id, new_task, ADD_TASK_SENTINEL_ORDER)
                .await
            {
                Ok(task) => outcome.tasks_created.push(task.id),
                Err(e) => {
                    tracing::warn!(suggestion_id = %suggestion.id, error = %e, "Failed to create suggested task");
                },
            }
        }
    }

    /// Operations run in array order. Ids are re-checked before each one
    /// since tasks may have been deleted since generation.
    async fn apply_optimize(&self, suggestion: &Suggestion, outcome: &mut AcceptOutcome) -> Result<()> {
        let tasks = TaskManager::new(self.pool);
        let plan_id = &suggestion.plan_id;

        for operation in suggestion.metadata.operations.iter().flatten() {
            match operation {
                TaskOperation::Reorder {
                    task_id,
                    before_task_id,
                } => {
                    let both_exist = tasks.task_exists_in_plan(plan_id, task_id).await?
                        && tasks.task_exists_in_plan(plan_id, before_task_id).await?;
                    if !both_exist {
                        tracing::debug!(
                            suggestion_id = %suggestion.id,
                            task_id = %task_id,
                            before_task_id = %before_task_id,
                            "Reorder skipped, task no longer in plan"
                        );
                        outcome.operations_skipped += 1;
                        continue;
                    }

                    tasks
                        .move_task(plan_id, task_id, Some(before_task_id.as_str()))
                        .await?;
                    outcome.operations_applied += 1;
                },
            }
        }
        Ok(())
    }

    async fn apply_breakdown(&self, suggestion: &Suggestion, outcome: &mut AcceptOutcome) {
        for task_id in &suggestion.related_task_ids {
            match self.break_down_task(&suggestion.plan_id, task_id).await {
                Ok(count) => outcome.subtasks_created += count,
                Err(e) => {
                    tracing::warn!(
                        suggestion_id = %suggestion.id,
                        task_id = %task_id,
                        error = %e,
                        "Breakdown skipped for task"
                    );
                    outcome.targets_skipped.push(task_id.clone());
                },
            }
        }
    }

    /// Generate subtasks for one task of the plan and insert them as 1..n.
    /// A failed insert skips that subtask only; the count is what landed.
    async fn break_down_task(&self, plan_id: &str, task_id: &str) -> Result<usize> {
        let task = TaskManager::new(self.pool)
            .get_task_in_plan(plan_id, task_id)
            .await?;
        let generated = self.subtask_generator.generate(&task).await?;

        let subtasks = SubtaskManager::new(self.pool);
        let mut created = 0;
        for entry in generated.into_iter().take(MAX_BREAKDOWN_SUBTASKS) {
            let title = bounded_text(&entry.title, MAX_TITLE_CHARS);
            if title.is_empty() {
                continue;
            }
            let description = bounded_text(&entry.description, MAX_TEXT_CHARS);
            let description = Some(description.as_str()).filter(|d| !d.is_empty());

            match subtasks
                .add_subtask_at(&task.id, &title, description, created as i64 + 1)
                .await
            {
                Ok(_) => created += 1,
                Err(e) => {
                    tracing::warn!(task_id = %task.id, error = %e, "Failed to create subtask");
                },
            }
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breakdown::GeneratedSubtask;
    use crate::db::models::{SuggestionMetadata, SuggestionPriority, SuggestionStatus};
    use crate::suggestions::validation::{SuggestionAction, ValidatedSuggestion};
    use crate::test_utils::test_helpers::{FixedSubtaskGenerator, TestContext};
    use uuid::Uuid;

    fn suggestion(action: SuggestionAction, related: Vec<String>) -> ValidatedSuggestion {
        ValidatedSuggestion {
            title: "Do more".to_string(),
            description: "Because".to_string(),
            priority: SuggestionPriority::Medium,
            actionable: true,
            action_button_text: None,
            related_task_ids: related,
            confidence_score: 0.7,
            reasoning: None,
            action,
        }
    }

    async fn store(ctx: &TestContext, plan_id: &str, validated: &ValidatedSuggestion) -> String {
        SuggestionStore::new(ctx.pool())
            .insert(plan_id, "u", validated)
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_accept_missing_suggestion() {
        let ctx = TestContext::new().await;
        let generator = FixedSubtaskGenerator::with_count(4);
        let executor = ActionExecutor::new(ctx.pool(), &generator);
        assert!(matches!(
            executor.accept_suggestion("missing").await,
            Err(PlanError::SuggestionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_add_task_creates_single_task() {
        let ctx = TestContext::new().await;
        let plan = ctx.create_plan("u", "Trip").await;
        let id = store(
            &ctx,
            &plan.id,
            &suggestion(SuggestionAction::AddTask { suggested_tasks: vec![] }, vec![]),
        )
        .await;
        let generator = FixedSubtaskGenerator::with_count(4);

        let outcome = ActionExecutor::new(ctx.pool(), &generator)
            .accept_suggestion(&id)
            .await
            .unwrap();

        assert_eq!(outcome.tasks_created.len(), 1);
        let tasks = TaskManager::new(ctx.pool()).list_tasks(&plan.id).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "New Task: Do more");
        assert_eq!(tasks[0].description.as_deref(), Some("Because"));
        assert_eq!(tasks[0].order, ADD_TASK_SENTINEL_ORDER);

        let stored = SuggestionStore::new(ctx.pool()).get(&id).await.unwrap();
        assert_eq!(stored.status, SuggestionStatus::Accepted);
        assert!(stored.acted_at.is_some());
    }

    #[tokio::test]
    async fn test_add_task_creates_one_per_suggested_task() {
        let ctx = TestContext::new().await;
        let plan = ctx.create_plan("u", "Trip").await;
        let suggested = vec![
            SuggestedTask { title: "Book hotel".into(), description: "".into() },
            SuggestedTask { title: "Buy insurance".into(), description: "travel".into() },
        ];
        let id = store(
            &ctx,
            &plan.id,
            &suggestion(SuggestionAction::AddTask { suggested_tasks: suggested }, vec![]),
        )
        .await;
        let generator = FixedSubtaskGenerator::with_count(4);

        let outcome = ActionExecutor::new(ctx.pool(), &generator)
            .accept_suggestion(&id)
            .await
            .unwrap();

        assert_eq!(outcome.tasks_created.len(), 2);
        let titles: Vec<String> = TaskManager::new(ctx.pool())
            .list_tasks(&plan.id)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["Book hotel", "Buy insurance"]);
    }

    #[tokio::test]
    async fn test_accept_twice_is_refused_without_side_effects() {
        let ctx = TestContext::new().await;
        let plan = ctx.create_plan("u", "Trip").await;
        let id = store(
            &ctx,
            &plan.id,
            &suggestion(SuggestionAction::AddTask { suggested_tasks: vec![] }, vec![]),
        )
        .await;
        let generator = FixedSubtaskGenerator::with_count(4);
        let executor = ActionExecutor::new(ctx.pool(), &generator);

        executor.accept_suggestion(&id).await.unwrap();
        assert!(matches!(
            executor.accept_suggestion(&id).await,
            Err(PlanError::ActionNotAllowed(_))
        ));
        assert_eq!(
            TaskManager::new(ctx.pool()).list_tasks(&plan.id).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_dismissed_suggestion_cannot_be_accepted() {
        let ctx = TestContext::new().await;
        let plan = ctx.create_plan("u", "Trip").await;
        let id = store(&ctx, &plan.id, &suggestion(SuggestionAction::Warning, vec![])).await;
        SuggestionStore::new(ctx.pool()).dismiss(&id).await.unwrap();

        let generator = FixedSubtaskGenerator::with_count(4);
        assert!(matches!(
            ActionExecutor::new(ctx.pool(), &generator).accept_suggestion(&id).await,
            Err(PlanError::ActionNotAllowed(_))
        ));
    }

    #[tokio::test]
    async fn test_optimize_applies_and_skips_operations() {
        let ctx = TestContext::new().await;
        let plan = ctx.create_plan("u", "Trip").await;
        let tasks = TaskManager::new(ctx.pool());
        let a = tasks.add_task(&plan.id, NewTask::titled("A", None)).await.unwrap();
        let b = tasks.add_task(&plan.id, NewTask::titled("B", None)).await.unwrap();
        let c = tasks.add_task(&plan.id, NewTask::titled("C", None)).await.unwrap();

        let operations = vec![
            TaskOperation::Reorder { task_id: c.id.clone(), before_task_id: a.id.clone() },
            TaskOperation::Reorder {
                task_id: b.id.clone(),
                before_task_id: Uuid::new_v4().to_string(),
            },
        ];
        let id = store(
            &ctx,
            &plan.id,
            &suggestion(SuggestionAction::Optimize { operations }, vec![]),
        )
        .await;
        let generator = FixedSubtaskGenerator::with_count(4);

        let outcome = ActionExecutor::new(ctx.pool(), &generator)
            .accept_suggestion(&id)
            .await
            .unwrap();

        assert_eq!(outcome.operations_applied, 1);
        assert_eq!(outcome.operations_skipped, 1);
        let order: Vec<String> = tasks
            .list_tasks(&plan.id)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(order, vec![c.id, a.id, b.id]);
    }

    #[tokio::test]
    async fn test_breakdown_skips_foreign_task() {
        let ctx = TestContext::new().await;
        let plan = ctx.create_plan("u", "Trip").await;
        let own = TaskManager::new(ctx.pool())
            .add_task(&plan.id, NewTask::titled("Book hotel", None))
            .await
            .unwrap();
        let foreign = ctx.create_task("u", "Other", "Elsewhere").await;

        // Related ids are checked against the plan again at accept time
        let id = store(
            &ctx,
            &plan.id,
            &suggestion(
                SuggestionAction::Breakdown,
                vec![foreign.id.clone(), own.id.clone()],
            ),
        )
        .await;
        let generator = FixedSubtaskGenerator::with_count(5);

        let outcome = ActionExecutor::new(ctx.pool(), &generator)
            .accept_suggestion(&id)
            .await
            .unwrap();

        assert_eq!(outcome.subtasks_created, 5);
        assert_eq!(outcome.targets_skipped, vec![foreign.id.clone()]);

        let subtasks = SubtaskManager::new(ctx.pool());
        let own_subtasks = subtasks.list_subtasks(&own.id).await.unwrap();
        assert_eq!(
            own_subtasks.iter().map(|s| s.order).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
        assert!(subtasks.list_subtasks(&foreign.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_breakdown_caps_and_sanitizes_subtasks() {
        let ctx = TestContext::new().await;
        let plan = ctx.create_plan("u", "Trip").await;
        let task = TaskManager::new(ctx.pool())
            .add_task(&plan.id, NewTask::titled("Huge", None))
            .await
            .unwrap();

        let mut subtasks: Vec<GeneratedSubtask> = (0..30)
            .map(|i| GeneratedSubtask {
                title: format!("<b>Part {}</b>", i),
                description: "<i>x</i>".to_string(),
            })
            .collect();
        subtasks.insert(0, GeneratedSubtask { title: "<br/>".into(), description: String::new() });
        let generator = FixedSubtaskGenerator {
            subtasks,
            fail_for: Default::default(),
        };

        let id = store(
            &ctx,
            &plan.id,
            &suggestion(SuggestionAction::Breakdown, vec![task.id.clone()]),
        )
        .await;
        let outcome = ActionExecutor::new(ctx.pool(), &generator)
            .accept_suggestion(&id)
            .await
            .unwrap();

        // The blank first entry counts toward the cap but is not inserted
        assert_eq!(outcome.subtasks_created, MAX_BREAKDOWN_SUBTASKS - 1);
        let created = SubtaskManager::new(ctx.pool()).list_subtasks(&task.id).await.unwrap();
        assert_eq!(created[0].title, "Part 0");
        assert_eq!(created[0].order, 1);
        assert_eq!(created[0].description.as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn test_breakdown_generator_failure_skips_only_that_task() {
        let ctx = TestContext::new().await;
        let plan = ctx.create_plan("u", "Trip").await;
        let tasks = TaskManager::new(ctx.pool());
        let bad = tasks.add_task(&plan.id, NewTask::titled("Bad", None)).await.unwrap();
        let good = tasks.add_task(&plan.id, NewTask::titled("Good", None)).await.unwrap();

        let mut generator = FixedSubtaskGenerator::with_count(4);
        generator.fail_for.insert("Bad".to_string());

        let id = store(
            &ctx,
            &plan.id,
            &suggestion(SuggestionAction::Breakdown, vec![bad.id.clone(), good.id.clone()]),
        )
        .await;
        let outcome = ActionExecutor::new(ctx.pool(), &generator)
            .accept_suggestion(&id)
            .await
            .unwrap();

        assert_eq!(outcome.subtasks_created, 4);
        assert_eq!(outcome.targets_skipped, vec![bad.id]);
        assert_eq!(
            SuggestionStore::new(ctx.pool()).get(&id).await.unwrap().status,
            SuggestionStatus::Accepted
        );
    }

    #[tokio::test]
    async fn test_warning_only_marks_accepted() {
        let ctx = TestContext::new().await;
        let plan = ctx.create_plan("u", "Trip").await;
        let id = store(&ctx, &plan.id, &suggestion(SuggestionAction::Warning, vec![])).await;
        let generator = FixedSubtaskGenerator::with_count(4);

        let outcome = ActionExecutor::new(ctx.pool(), &generator)
            .accept_suggestion(&id)
            .await
            .unwrap();

        assert_eq!(outcome.suggestion_type, Some(SuggestionType::Warning));
        assert!(outcome.tasks_created.is_empty());
        let stored = SuggestionStore::new(ctx.pool()).get(&id).await.unwrap();
        assert_eq!(stored.status, SuggestionStatus::Accepted);
        assert_eq!(stored.metadata, SuggestionMetadata::default());
    }
}
