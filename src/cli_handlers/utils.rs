//! Output helpers shared by CLI handlers

use crate::db::models::{PlanWithDetails, Suggestion, TaskStatus};
use crate::error::Result;
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn get_status_badge(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Completed => "✓",
        TaskStatus::InProgress => "→",
        TaskStatus::Pending => "○",
    }
}

pub fn print_plan_details(details: &PlanWithDetails) {
    let plan = &details.plan;
    println!("{} [{}]", plan.title, plan.status.as_str());
    println!("  id: {}", plan.id);
    if let Some(plan_type) = &plan.plan_type {
        println!("  type: {}", plan_type);
    }
    if let Some(hours) = plan.total_estimated_hours {
        println!("  estimated: {:.1}h", hours);
    }
    if let Some(cost) = plan.total_estimated_cost_usd {
        println!("  cost: ${:.2}", cost);
    }
    if let Some(health) = plan.health_score {
        println!("  health: {}", health);
    }

    println!();
    println!("Tasks ({})", details.tasks.len());
    for task in &details.tasks {
        println!("  {} {:>3}. {}  ({})", get_status_badge(task.status), task.order, task.title, task.id);
    }

    if !details.resources.is_empty() {
        println!();
        println!("Resources ({})", details.resources.len());
        for resource in &details.resources {
            println!("  - {} <{}>", resource.title, resource.url);
        }
    }
}

pub fn print_suggestion(suggestion: &Suggestion) {
    println!(
        "[{}|{}] {}  ({})",
        suggestion.suggestion_type.as_str(),
        suggestion.priority.as_str(),
        suggestion.title,
        suggestion.id
    );
    if !suggestion.description.is_empty() {
        println!("    {}", suggestion.description);
    }
    if !suggestion.related_task_ids.is_empty() {
        println!("    tasks: {}", suggestion.related_task_ids.join(", "));
    }
}
