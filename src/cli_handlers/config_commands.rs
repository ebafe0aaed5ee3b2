use crate::cli::ConfigCommands;
use crate::config::{config_delete, config_get, config_list, config_set, is_sensitive_key, mask_value};
use crate::context::AppContext;
use crate::error::Result;
use serde_json::json;
use std::path::PathBuf;

fn display(key: &str, value: &str) -> String {
    if is_sensitive_key(key) {
        mask_value(value)
    } else {
        value.to_string()
    }
}

/// Handle all `plangenie config` subcommands
pub async fn handle_config_command(db: Option<PathBuf>, cmd: ConfigCommands) -> Result<()> {
    let ctx = AppContext::load(db).await?;

    match cmd {
        ConfigCommands::Set { key, value, format } => {
            config_set(&ctx.pool, &key, &value).await?;
            let shown = display(&key, &value);
            if format == "json" {
                println!("{}", json!({ "key": key, "value": shown, "set": true }));
            } else {
                println!("Set {} = {}", key, shown);
            }
        },

        ConfigCommands::Get { key, format } => {
            let value = config_get(&ctx.pool, &key).await?;
            let shown = value.as_deref().map(|v| display(&key, v));
            if format == "json" {
                println!("{}", json!({ "key": key, "value": shown }));
            } else {
                match shown {
                    Some(v) => println!("{} = {}", key, v),
                    None => println!("{}: (not set)", key),
                }
            }
        },

        ConfigCommands::List { prefix, format } => {
            let entries = config_list(&ctx.pool, prefix.as_deref()).await?;
            if format == "json" {
                let items: Vec<_> = entries
                    .iter()
                    .map(|(k, v)| json!({ "key": k, "value": display(k, v) }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&json!({ "config": items }))?);
            } else if entries.is_empty() {
                println!("No configuration entries found.");
            } else {
                for (key, value) in &entries {
                    println!("{} = {}", key, display(key, value));
                }
            }
        },

        ConfigCommands::Unset { key, format } => {
            let deleted = config_delete(&ctx.pool, &key).await?;
            if format == "json" {
                println!("{}", json!({ "key": key, "deleted": deleted }));
            } else if deleted {
                println!("Unset {}", key);
            } else {
                println!("{}: (not found)", key);
            }
        },
    }

    Ok(())
}
