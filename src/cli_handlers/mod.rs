// CLI command handlers, one module per command group

pub mod config_commands;
pub mod plan_commands;
pub mod suggestions_commands;
pub mod utils;

pub use config_commands::handle_config_command;
pub use plan_commands::handle_plan_command;
pub use suggestions_commands::handle_suggestions_command;
