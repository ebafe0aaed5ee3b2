use super::utils::{print_json, print_plan_details};
use crate::cli::PlanCommands;
use crate::context::AppContext;
use crate::db::models::PlanStatus;
use crate::error::{PlanError, Result};
use crate::plan_generator::{PlanGenerator, PlanRequest};
use crate::plans::PlanManager;
use std::path::PathBuf;

pub async fn handle_plan_command(db: Option<PathBuf>, cmd: PlanCommands) -> Result<()> {
    let ctx = AppContext::load(db).await?;
    let plans = PlanManager::new(&ctx.pool);

    match cmd {
        PlanCommands::List {
            user,
            status,
            page,
            limit,
            format,
        } => {
            let status = status
                .as_deref()
                .map(|s| {
                    PlanStatus::parse(s)
                        .ok_or_else(|| PlanError::InvalidInput(format!("Unknown plan status '{}'", s)))
                })
                .transpose()?;
            let result = plans.list_plans(&user, status, page, limit).await?;

            if format == "json" {
                print_json(&result)?;
            } else if result.plans.is_empty() {
                println!("No plans found.");
            } else {
                for plan in &result.plans {
                    println!("{}  {} [{}]", plan.id, plan.title, plan.status.as_str());
                }
                println!();
                println!(
                    "Page {} ({} per page), {} plan(s) total",
                    result.page, result.limit, result.total
                );
            }
        },

        PlanCommands::Show { id, user, format } => {
            plans.verify_ownership(&id, &user).await?;
            let details = plans.get_plan_with_details(&id).await?;
            if format == "json" {
                print_json(&details)?;
            } else {
                print_plan_details(&details);
            }
        },

        PlanCommands::Generate {
            goal,
            user,
            description,
            timeline,
            format,
        } => {
            let client = ctx.completion_client().await?;
            let request = PlanRequest {
                goal,
                description,
                timeline,
            };
            let details = PlanGenerator::new(&ctx.pool, client.as_ref())
                .create_plan(&user, &request)
                .await?;

            if format == "json" {
                print_json(&details)?;
            } else {
                print_plan_details(&details);
            }
        },
    }

    Ok(())
}
