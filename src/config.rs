use crate::error::{PlanError, Result};
use sqlx::SqlitePool;
use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "PLANGENIE_DB_PATH";
pub const PORT_ENV: &str = "PLANGENIE_PORT";

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_SUGGESTION_LIMIT: u32 = 5;
pub const DEFAULT_SUGGESTION_WINDOW_SECS: u64 = 3600;

/// Keys that cannot be modified via config commands
pub const PROTECTED_KEYS: &[&str] = &["schema_version"];

/// Keys whose values are masked in output
pub fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    lower.contains("api_key") || lower.contains("secret")
}

/// Show the first 4 chars followed by a mask
pub fn mask_value(value: &str) -> String {
    match value.char_indices().nth(4) {
        Some((idx, _)) => format!("{}...********", &value[..idx]),
        None => "********".to_string(),
    }
}

/// Database location: `PLANGENIE_DB_PATH`, else `~/.plangenie/plangenie.db`.
/// Resolved before the pool exists, so it never consults `app_config`.
pub fn resolve_db_path(override_path: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = override_path {
        return Ok(path);
    }
    if let Some(path) = env_value(DB_PATH_ENV) {
        return Ok(PathBuf::from(path));
    }
    dirs::home_dir()
        .map(|home| home.join(".plangenie").join("plangenie.db"))
        .ok_or_else(|| {
            PlanError::InvalidInput(format!(
                "Cannot determine home directory; set {}",
                DB_PATH_ENV
            ))
        })
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// LLM connection settings. Only complete when endpoint and api key are set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
}

/// Rolling-window limits for suggestion generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestionLimits {
    pub max_per_window: u32,
    pub window_secs: u64,
}

impl Default for SuggestionLimits {
    fn default() -> Self {
        Self {
            max_per_window: DEFAULT_SUGGESTION_LIMIT,
            window_secs: DEFAULT_SUGGESTION_WINDOW_SECS,
        }
    }
}

/// Runtime settings: environment variables override the `app_config` table,
/// which overrides built-in defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub llm: Option<LlmConfig>,
    pub suggestions: SuggestionLimits,
}

impl AppConfig {
    pub async fn resolve(pool: &SqlitePool) -> Result<Self> {
        let port = parse_or(
            resolve_field(pool, PORT_ENV, "server.port").await?,
            "server.port",
            DEFAULT_PORT,
        )?;

        let max_per_window = parse_or(
            resolve_field(pool, "PLANGENIE_SUGGESTION_LIMIT", "suggestions.max_per_window")
                .await?,
            "suggestions.max_per_window",
            DEFAULT_SUGGESTION_LIMIT,
        )?;
        let window_secs = parse_or(
            resolve_field(
                pool,
                "PLANGENIE_SUGGESTION_WINDOW_SECS",
                "suggestions.window_secs",
            )
            .await?,
            "suggestions.window_secs",
            DEFAULT_SUGGESTION_WINDOW_SECS,
        )?;

        Ok(Self {
            port,
            llm: LlmConfig::resolve(pool).await?,
            suggestions: SuggestionLimits {
                max_per_window,
                window_secs,
            },
        })
    }
}

impl LlmConfig {
    /// Returns Some only when endpoint and api key are both configured.
    /// The model falls back to a default.
    pub async fn resolve(pool: &SqlitePool) -> Result<Option<Self>> {
        let endpoint = resolve_field(pool, "PLANGENIE_LLM_ENDPOINT", "llm.endpoint").await?;
        let api_key = resolve_field(pool, "PLANGENIE_LLM_API_KEY", "llm.api_key").await?;
        let model = resolve_field(pool, "PLANGENIE_LLM_MODEL", "llm.model").await?;

        match (endpoint, api_key) {
            (Some(endpoint), Some(api_key)) => Ok(Some(Self {
                endpoint,
                api_key,
                model: model.unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            })),
            _ => Ok(None),
        }
    }
}

/// Env var takes priority over the stored value
async fn resolve_field(pool: &SqlitePool, env_var: &str, key: &str) -> Result<Option<String>> {
    if let Some(val) = env_value(env_var) {
        return Ok(Some(val));
    }
    config_get(pool, key).await
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| {
            PlanError::InvalidInput(format!("Invalid value for '{}': {}", key, value))
        }),
    }
}

pub async fn config_set(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    if PROTECTED_KEYS.contains(&key) {
        return Err(PlanError::ActionNotAllowed(format!(
            "Cannot modify protected key: '{}'",
            key
        )));
    }
    sqlx::query(
        "INSERT INTO app_config (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn config_get(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM app_config WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

pub async fn config_list(pool: &SqlitePool, prefix: Option<&str>) -> Result<Vec<(String, String)>> {
    let pattern = format!("{}%", prefix.unwrap_or(""));
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT key, value FROM app_config WHERE key != 'schema_version' AND key LIKE ? ORDER BY key",
    )
    .bind(pattern)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn config_delete(pool: &SqlitePool, key: &str) -> Result<bool> {
    if PROTECTED_KEYS.contains(&key) {
        return Err(PlanError::ActionNotAllowed(format!(
            "Cannot delete protected key: '{}'",
            key
        )));
    }
    let result = sqlx::query("DELETE FROM app_config WHERE key = ?")
        .bind(key)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
