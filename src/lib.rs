pub mod breakdown;
pub mod cli;
pub mod cli_handlers;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod llm;
pub mod logging;
pub mod plan_generator;
pub mod plans;
pub mod server;
pub mod subtasks;
pub mod suggestions;
pub mod tasks;

#[cfg(test)]
pub mod test_utils;
