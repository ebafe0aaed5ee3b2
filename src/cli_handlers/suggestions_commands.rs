use super::utils::{print_json, print_suggestion};
use crate::cli::SuggestionsCommands;
use crate::context::AppContext;
use crate::error::Result;
use crate::plans::PlanManager;
use crate::suggestions::{fetch_suggestions, ActionExecutor, InMemoryRateLimiter, SuggestionStore};
use serde_json::json;
use std::path::PathBuf;

pub async fn handle_suggestions_command(db: Option<PathBuf>, cmd: SuggestionsCommands) -> Result<()> {
    let ctx = AppContext::load(db).await?;
    let plans = PlanManager::new(&ctx.pool);
    let store = SuggestionStore::new(&ctx.pool);

    match cmd {
        SuggestionsCommands::List {
            plan_id,
            user,
            format,
        } => {
            plans.verify_ownership(&plan_id, &user).await?;
            let pending = store.get_pending(&plan_id).await?;
            if format == "json" {
                print_json(&pending)?;
            } else if pending.is_empty() {
                println!("No pending suggestions.");
            } else {
                for suggestion in &pending {
                    print_suggestion(suggestion);
                }
            }
        },

        SuggestionsCommands::Generate {
            plan_id,
            user,
            force,
            format,
        } => {
            let plan = plans.verify_ownership(&plan_id, &user).await?;
            let config = ctx.config().await?;
            let client = ctx.completion_client().await?;
            // Each CLI invocation is its own process, so the window only
            // covers this call
            let limiter = InMemoryRateLimiter::from_limits(config.suggestions);

            let suggestions =
                fetch_suggestions(&ctx.pool, client.as_ref(), &limiter, &plan, &user, force).await?;

            if format == "json" {
                print_json(&suggestions)?;
            } else if suggestions.is_empty() {
                println!("No suggestions right now.");
            } else {
                for suggestion in &suggestions {
                    print_suggestion(suggestion);
                }
                println!();
                println!("To accept: plangenie suggestions accept <id> --user {}", user);
            }
        },

        SuggestionsCommands::Accept { id, user, format } => {
            let suggestion = store.get(&id).await?;
            plans.verify_ownership(&suggestion.plan_id, &user).await?;

            let generator = ctx.subtask_generator().await?;
            let outcome = ActionExecutor::new(&ctx.pool, generator.as_ref())
                .accept_suggestion(&id)
                .await?;

            if format == "json" {
                print_json(&outcome)?;
            } else {
                println!("Accepted: {}", suggestion.title);
                if !outcome.tasks_created.is_empty() {
                    println!("  tasks created: {}", outcome.tasks_created.len());
                }
                if outcome.operations_applied + outcome.operations_skipped > 0 {
                    println!(
                        "  reorders applied: {} (skipped {})",
                        outcome.operations_applied, outcome.operations_skipped
                    );
                }
                if outcome.subtasks_created > 0 {
                    println!("  subtasks created: {}", outcome.subtasks_created);
                }
                if !outcome.targets_skipped.is_empty() {
                    println!("  skipped tasks: {}", outcome.targets_skipped.join(", "));
                }
            }
        },

        SuggestionsCommands::Dismiss { id, user, format } => {
            let suggestion = store.get(&id).await?;
            plans.verify_ownership(&suggestion.plan_id, &user).await?;
            store.dismiss(&id).await?;

            if format == "json" {
                println!("{}", json!({ "id": id, "dismissed": true }));
            } else {
                println!("Dismissed: {}", suggestion.title);
            }
        },
    }

    Ok(())
}
