use clap::{Parser, Subcommand};
use std::path::PathBuf;

const LONG_ABOUT: &str = r#"
PlanGenie - AI planning assistant backend

Turns a goal into a plan of ordered tasks and resources, then keeps nudging
with proactive suggestions that can be accepted to change the plan.

Common workflow:
  plangenie serve                                     ← HTTP API on :8000
  plangenie plans generate "Trip to Udaipur" --user u1
  plangenie suggestions generate <plan-id> --user u1
  plangenie suggestions accept <suggestion-id> --user u1

LLM settings (env or `plangenie config set`):
  PLANGENIE_LLM_ENDPOINT / llm.endpoint
  PLANGENIE_LLM_API_KEY  / llm.api_key
  PLANGENIE_LLM_MODEL    / llm.model     (default gpt-4o-mini)

Without an LLM, plans use a template and suggestions stay empty.
"#;

#[derive(Parser, Clone)]
#[command(name = "plangenie")]
#[command(about = "Planning assistant backend - AI plans, proactive suggestions, executable actions")]
#[command(long_about = LONG_ABOUT)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output (-q)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output logs in JSON format
    #[arg(long)]
    pub json: bool,

    /// Database file (default: $PLANGENIE_DB_PATH or ~/.plangenie/plangenie.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Run the HTTP API server
    ///
    /// Examples:
    ///   plangenie serve
    ///   plangenie serve --port 9000 --log-file /var/log/plangenie.log
    Serve {
        /// Port to bind (default: $PLANGENIE_PORT, server.port or 8000)
        #[arg(long)]
        port: Option<u16>,

        /// Also write logs to this file (rotated daily)
        #[arg(long)]
        log_file: Option<PathBuf>,
    },

    /// Plan management
    #[command(subcommand)]
    Plans(PlanCommands),

    /// Proactive suggestions for a plan
    #[command(subcommand)]
    Suggestions(SuggestionsCommands),

    /// Configuration management (LLM settings, limits)
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Clone)]
pub enum PlanCommands {
    /// List a user's plans
    ///
    /// Examples:
    ///   plangenie plans list --user u1
    ///   plangenie plans list --user u1 --status completed --page 2
    List {
        /// Owner of the plans
        #[arg(long)]
        user: String,

        /// Filter by status (draft, active, completed, archived)
        #[arg(short, long)]
        status: Option<String>,

        /// Page number, 1-based
        #[arg(long)]
        page: Option<i64>,

        /// Page size (max 100)
        #[arg(long)]
        limit: Option<i64>,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Show a plan with its tasks and resources
    Show {
        /// Plan ID
        id: String,

        #[arg(long)]
        user: String,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Generate and store a plan for a goal
    ///
    /// Examples:
    ///   plangenie plans generate "Learn Spanish" --user u1 --timeline "3 months"
    Generate {
        /// What the user wants to achieve
        goal: String,

        #[arg(long)]
        user: String,

        /// Extra context for the planner
        #[arg(short, long)]
        description: Option<String>,

        /// Desired timeline, e.g. "2 weeks"
        #[arg(long)]
        timeline: Option<String>,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand, Clone)]
pub enum SuggestionsCommands {
    /// List pending suggestions for a plan (no generation)
    List {
        /// Plan ID
        plan_id: String,

        #[arg(long)]
        user: String,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Generate suggestions unless pending ones exist
    ///
    /// Examples:
    ///   plangenie suggestions generate <plan-id> --user u1
    ///   plangenie suggestions generate <plan-id> --user u1 --force
    Generate {
        /// Plan ID
        plan_id: String,

        #[arg(long)]
        user: String,

        /// Generate even when pending suggestions exist
        #[arg(long)]
        force: bool,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Accept a suggestion and apply its action to the plan
    Accept {
        /// Suggestion ID
        id: String,

        #[arg(long)]
        user: String,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Dismiss a suggestion
    Dismiss {
        /// Suggestion ID
        id: String,

        #[arg(long)]
        user: String,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Set a configuration value
    ///
    /// Examples:
    ///   plangenie config set llm.endpoint https://api.openai.com/v1/chat/completions
    ///   plangenie config set llm.api_key sk-...
    ///   plangenie config set suggestions.max_per_window 10
    Set {
        key: String,
        value: String,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Get a configuration value
    Get {
        key: String,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// List configuration values
    List {
        /// Only keys starting with this prefix
        #[arg(long)]
        prefix: Option<String>,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Remove a configuration value
    Unset {
        key: String,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}
