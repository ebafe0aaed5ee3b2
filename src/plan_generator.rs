//! Turns a goal into a stored plan: tasks and resources from the LLM, or a
//! deterministic template when the LLM is unavailable or returns junk.

use crate::db::models::{PlanWithDetails, ResourceType};
use crate::error::{PlanError, Result};
use crate::llm::{clean_json_response, CompletionClient, CompletionRequest};
use crate::plans::{NewPlan, NewResource, PlanAggregates, PlanManager};
use crate::suggestions::validation::{bounded_text, MAX_TEXT_CHARS, MAX_TITLE_CHARS};
use crate::tasks::{NewTask, TaskManager, MAX_ORDER};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;

/// Minimum number of tasks an LLM plan must contain to be accepted
pub const MIN_GENERATED_TASKS: usize = 5;

const SYSTEM_PROMPT: &str = "You are PlanGenie, an expert AI planning assistant. \
You turn goals into concrete, realistic, well-ordered action plans with honest time and cost estimates. \
You always respond with valid JSON only.";

/// Plan category, detected from the goal text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    Travel,
    Learning,
    Fitness,
    Project,
    Event,
    Default,
}

impl PlanType {
    /// Checked in this order; the first type with a matching keyword wins
    const KEYWORDS: [(PlanType, &'static [&'static str]); 5] = [
        (
            PlanType::Travel,
            &["trip", "travel", "vacation", "visit", "tour", "destination"],
        ),
        (
            PlanType::Learning,
            &["learn", "course", "study", "master", "tutorial", "skill"],
        ),
        (
            PlanType::Fitness,
            &["fitness", "workout", "exercise", "gym", "weight", "health", "diet"],
        ),
        (
            PlanType::Project,
            &["build", "create", "develop", "project", "app", "website", "software"],
        ),
        (
            PlanType::Event,
            &["event", "party", "wedding", "conference", "meetup", "gathering"],
        ),
    ];

    pub fn detect(goal: &str, description: Option<&str>) -> Self {
        let text = format!("{} {}", goal, description.unwrap_or_default()).to_lowercase();
        Self::KEYWORDS
            .iter()
            .find(|(_, words)| words.iter().any(|w| text.contains(w)))
            .map_or(PlanType::Default, |(plan_type, _)| *plan_type)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Travel => "travel",
            PlanType::Learning => "learning",
            PlanType::Fitness => "fitness",
            PlanType::Project => "project",
            PlanType::Event => "event",
            PlanType::Default => "default",
        }
    }

    /// Title prefixes used for this kind of plan
    pub fn categories(&self) -> &'static [&'static str] {
        match self {
            PlanType::Travel => &["Planning", "Preparation", "Execution", "Experience"],
            PlanType::Learning => &["Planning", "Setup", "Learning", "Practice", "Review"],
            PlanType::Fitness => &["Planning", "Preparation", "Training", "Tracking"],
            PlanType::Project => &["Planning", "Setup", "Development", "Testing", "Launch"],
            PlanType::Event => &["Planning", "Preparation", "Execution", "Follow-up"],
            PlanType::Default => &["Planning", "Preparation", "Execution", "Review & Adjust"],
        }
    }
}

/// What the user asked for
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanRequest {
    pub goal: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub timeline: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeneratedTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub order: f64,
    #[serde(default)]
    pub estimated_time_hours: Option<f64>,
    #[serde(default)]
    pub difficulty: Option<f64>,
    #[serde(default)]
    pub estimated_cost_usd: Option<f64>,
    #[serde(default)]
    pub tools_needed: Vec<String>,
    #[serde(default)]
    pub prerequisites: Vec<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeneratedResource {
    pub title: String,
    pub url: String,
    #[serde(rename = "type", default)]
    pub resource_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedPlan {
    pub plan_type: PlanType,
    pub tasks: Vec<GeneratedTask>,
    pub resources: Vec<GeneratedResource>,
    /// False when the template plan was used
    pub from_llm: bool,
}

fn build_prompt(request: &PlanRequest, plan_type: PlanType) -> String {
    format!(
        r#"Create a detailed, actionable plan for this goal.

GOAL: {}
DETAILS: {}
TIMELINE: {}
PLAN TYPE: {}
TASK CATEGORIES: {}

Requirements:
- 8-12 tasks, each title prefixed with one of the task categories (e.g. "Planning: ...")
- Make time estimates realistic (account for research, doing and verifying)
- Difficulty should reflect skill level needed (1=anyone can do, 5=expert level)
- Prerequisites should reference task order numbers (1-based indexing)
- Cost should be 0 for free tasks, null if truly unknown, or an estimate in USD
- Tags should be lowercase snake_case
- 6-10 genuinely useful resources with real URLs
- No placeholder text or "TBD"

Respond with ONLY this JSON structure:
{{
    "tasks": [
        {{
            "title": "string with category prefix",
            "description": "string (2-4 sentences)",
            "order": 1,
            "estimated_time_hours": 1.5,
            "difficulty": 3,
            "estimated_cost_usd": 0,
            "tools_needed": ["string"],
            "prerequisites": [1],
            "tags": ["string"]
        }}
    ],
    "resources": [
        {{"title": "string", "url": "string", "type": "link|document|video|other"}}
    ]
}}"#,
        request.goal,
        request.description.as_deref().unwrap_or("(none)"),
        request.timeline.as_deref().unwrap_or("flexible"),
        plan_type.as_str(),
        plan_type.categories().join(", "),
    )
}

/// Structural check of an LLM plan before it is deserialized
pub fn validate_plan_structure(value: &Value) -> Result<()> {
    fn invalid(msg: String) -> Result<()> {
        Err(PlanError::LlmError(format!("Invalid plan structure: {}", msg)))
    }

    let Some(tasks) = value.get("tasks").and_then(Value::as_array) else {
        return invalid("missing tasks list".to_string());
    };
    let Some(resources) = value.get("resources").and_then(Value::as_array) else {
        return invalid("missing resources list".to_string());
    };
    if tasks.len() < MIN_GENERATED_TASKS {
        return invalid(format!(
            "expected at least {} tasks, got {}",
            MIN_GENERATED_TASKS,
            tasks.len()
        ));
    }

    for (i, task) in tasks.iter().enumerate() {
        let ok = task.get("title").is_some_and(Value::is_string)
            && task.get("description").is_some_and(Value::is_string)
            && task.get("order").is_some_and(Value::is_number);
        if !ok {
            return invalid(format!("task {} lacks title, description or order", i + 1));
        }
    }
    for (i, resource) in resources.iter().enumerate() {
        let ok = ["title", "url", "type"]
            .iter()
            .all(|key| resource.get(key).is_some_and(Value::is_string));
        if !ok {
            return invalid(format!("resource {} lacks title, url or type", i + 1));
        }
    }
    Ok(())
}

/// Parse and check an LLM reply into tasks and resources
pub fn parse_generated_plan(content: &str) -> Result<(Vec<GeneratedTask>, Vec<GeneratedResource>)> {
    let value: Value = serde_json::from_str(clean_json_response(content))?;
    validate_plan_structure(&value)?;

    #[derive(Deserialize)]
    struct Raw {
        tasks: Vec<GeneratedTask>,
        resources: Vec<GeneratedResource>,
    }
    let raw: Raw = serde_json::from_value(value)?;
    Ok((raw.tasks, raw.resources))
}

/// Eight generic tasks and a fixed resource list, categorized for the plan type
pub fn fallback_plan(request: &PlanRequest, plan_type: PlanType) -> GeneratedPlan {
    let categories = plan_type.categories();
    let category = |index: usize| categories.get(index).or(categories.first()).copied().unwrap_or("Planning");
    let pace = match request.timeline.as_deref() {
        Some(t) if !t.trim().is_empty() => format!("within your {} timeline", t.trim()),
        _ => "at your own pace".to_string(),
    };
    let goal = request.goal.trim();

    let template: [(&str, String, f64, f64, &[i64], usize, &[&str]); 8] = [
        (
            "Define clear, specific goals",
            format!("Write down exactly what achieving \"{}\" looks like and how you will measure it.", goal),
            1.5, 2.0, &[], 0, &["goals", "planning"],
        ),
        (
            "Research and gather key resources",
            "Collect guides, tools and references that others have used for similar goals.".to_string(),
            2.5, 2.0, &[1], 0, &["research"],
        ),
        (
            "Create detailed timeline and milestones",
            format!("Break the goal into weekly milestones so you can finish {}.", pace),
            1.0, 3.0, &[1, 2], 1, &["timeline", "milestones"],
        ),
        (
            "Set up tools and environment",
            "Prepare the apps, accounts and space you need before starting the real work.".to_string(),
            2.0, 2.0, &[2], 1, &["setup"],
        ),
        (
            "Start with foundational tasks",
            "Tackle the first concrete steps that everything else depends on.".to_string(),
            5.0, 3.0, &[3, 4], 2, &["execution"],
        ),
        (
            "Implement daily/weekly routines",
            "Schedule recurring time blocks so progress happens consistently.".to_string(),
            0.5, 2.0, &[5], 2, &["habits", "routine"],
        ),
        (
            "Track progress and adjust approach",
            "Review what worked each week and adjust the plan where you fell behind.".to_string(),
            1.0, 2.0, &[5, 6], 2, &["tracking"],
        ),
        (
            "Build accountability and support",
            "Share your goal with someone or join a community that keeps you on track.".to_string(),
            1.5, 2.0, &[3], 3, &["accountability"],
        ),
    ];

    let tasks = template
        .into_iter()
        .enumerate()
        .map(|(i, (title, description, hours, difficulty, prereqs, cat, tags))| GeneratedTask {
            title: format!("{}: {}", category(cat), title),
            description,
            order: (i + 1) as f64,
            estimated_time_hours: Some(hours),
            difficulty: Some(difficulty),
            estimated_cost_usd: Some(0.0),
            tools_needed: Vec::new(),
            prerequisites: prereqs.to_vec(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        })
        .collect();

    let resources = [
        ("Notion Goal Tracking Templates", "https://www.notion.so/templates/category/goal-tracking", "document"),
        ("Trello Boards for Planning", "https://trello.com", "link"),
        ("Google Calendar", "https://calendar.google.com", "link"),
        ("Habitica Habit Tracker", "https://habitica.com", "link"),
        ("Toggl Time Tracking", "https://toggl.com", "link"),
        ("SMART Goals Guide", "https://www.mindtools.com/a4wo118/smart-goals", "document"),
        ("r/getdisciplined Community", "https://www.reddit.com/r/getdisciplined", "link"),
        ("Notion Project Templates", "https://www.notion.so/templates/category/projects", "document"),
    ]
    .into_iter()
    .map(|(title, url, kind)| GeneratedResource {
        title: title.to_string(),
        url: url.to_string(),
        resource_type: kind.to_string(),
    })
    .collect();

    GeneratedPlan {
        plan_type,
        tasks,
        resources,
        from_llm: false,
    }
}

fn valid_difficulty(value: Option<f64>) -> Option<i64> {
    value
        .filter(|d| d.is_finite())
        .map(|d| d.round() as i64)
        .filter(|d| (1..=5).contains(d))
}

/// Hours and cost are summed over tasks that have them. The health score is
/// `(6 - mean difficulty) * 20`, truncated, and absent when no task is rated.
pub fn compute_aggregates(tasks: &[GeneratedTask]) -> PlanAggregates {
    let total_estimated_hours = tasks.iter().filter_map(|t| t.estimated_time_hours).sum();
    let total_estimated_cost_usd = tasks.iter().filter_map(|t| t.estimated_cost_usd).sum();

    let difficulties: Vec<i64> = tasks.iter().filter_map(|t| valid_difficulty(t.difficulty)).collect();
    let health_score = if difficulties.is_empty() {
        None
    } else {
        let mean = difficulties.iter().sum::<i64>() as f64 / difficulties.len() as f64;
        Some(((6.0 - mean) * 20.0) as i64)
    };

    PlanAggregates {
        total_estimated_hours,
        total_estimated_cost_usd,
        health_score,
    }
}

pub struct PlanGenerator<'a> {
    pool: &'a SqlitePool,
    client: &'a dyn CompletionClient,
}

impl<'a> PlanGenerator<'a> {
    pub fn new(pool: &'a SqlitePool, client: &'a dyn CompletionClient) -> Self {
        Self { pool, client }
    }

    /// Ask the LLM for a plan; falls back to the template on any failure
    pub async fn generate(&self, request: &PlanRequest) -> GeneratedPlan {
        let plan_type = PlanType::detect(&request.goal, request.description.as_deref());
        let completion = CompletionRequest::new(build_prompt(request, plan_type))
            .with_system(SYSTEM_PROMPT)
            .with_temperature(0.7)
            .with_max_tokens(4000)
            .json();

        let parsed = match self.client.complete(completion).await {
            Ok(content) => parse_generated_plan(&content),
            Err(e) => Err(e),
        };

        match parsed {
            Ok((tasks, resources)) => GeneratedPlan {
                plan_type,
                tasks,
                resources,
                from_llm: true,
            },
            Err(e) => {
                tracing::warn!(error = %e, plan_type = plan_type.as_str(), "Plan generation failed, using template plan");
                fallback_plan(request, plan_type)
            },
        }
    }

    /// Generate a plan and persist it with its tasks, resources and aggregates
    pub async fn create_plan(&self, user_id: &str, request: &PlanRequest) -> Result<PlanWithDetails> {
        if request.goal.trim().is_empty() {
            return Err(PlanError::InvalidInput("Goal cannot be empty".to_string()));
        }

        let generated = self.generate(request).await;
        let plans = PlanManager::new(self.pool);
        let tasks = TaskManager::new(self.pool);

        let plan = plans
            .create_plan(
                user_id,
                NewPlan {
                    title: bounded_text(&request.goal, MAX_TITLE_CHARS),
                    description: request.description.clone(),
                    plan_type: Some(generated.plan_type.as_str().to_string()),
                },
            )
            .await?;

        let mut skipped = 0usize;
        for (i, task) in generated.tasks.iter().enumerate() {
            let title = bounded_text(&task.title, MAX_TITLE_CHARS);
            if title.is_empty() {
                skipped += 1;
                continue;
            }
            // NaN and infinities fall outside the range too
            let order = if (0.0..=MAX_ORDER as f64).contains(&task.order) {
                task.order.round() as i64
            } else {
                (i + 1) as i64
            };
            let new_task = NewTask {
                title,
                description: Some(bounded_text(&task.description, MAX_TEXT_CHARS)).filter(|d| !d.is_empty()),
                due_date: None,
                estimated_time_hours: task.estimated_time_hours.filter(|h| h.is_finite() && *h >= 0.0),
                difficulty: valid_difficulty(task.difficulty),
                estimated_cost_usd: task.estimated_cost_usd.filter(|c| c.is_finite() && *c >= 0.0),
                tools_needed: task.tools_needed.clone(),
                prerequisites: task.prerequisites.clone(),
                tags: task.tags.clone(),
            };
            tasks.add_task_at(&plan.id, new_task, order).await?;
        }

        for resource in &generated.resources {
            let title = bounded_text(&resource.title, MAX_TITLE_CHARS);
            if title.is_empty() || resource.url.trim().is_empty() {
                skipped += 1;
                continue;
            }
            plans
                .add_resource(
                    &plan.id,
                    NewResource {
                        title,
                        url: resource.url.trim().to_string(),
                        resource_type: (!resource.resource_type.trim().is_empty())
                            .then(|| ResourceType::parse_lenient(&resource.resource_type)),
                    },
                )
                .await?;
        }

        plans
            .update_aggregates(&plan.id, compute_aggregates(&generated.tasks))
            .await?;

        tracing::info!(
            plan_id = %plan.id,
            user_id = user_id,
            plan_type = generated.plan_type.as_str(),
            from_llm = generated.from_llm,
            tasks = generated.tasks.len(),
            resources = generated.resources.len(),
            skipped = skipped,
            "Plan generated"
        );

        plans.get_plan_with_details(&plan.id).await
    }
}
