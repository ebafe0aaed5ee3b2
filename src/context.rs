use crate::breakdown::{LlmSubtaskGenerator, SubtaskGenerator};
use crate::config::{resolve_db_path, AppConfig};
use crate::db::{create_pool, run_migrations};
use crate::error::Result;
use crate::llm::{client_from_config, CompletionClient};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;

/// Opened database plus resolved settings, shared by CLI commands
pub struct AppContext {
    pub db_path: PathBuf,
    pub pool: SqlitePool,
}

impl AppContext {
    /// Open (creating if needed) the database and bring its schema up to date
    pub async fn load(db_override: Option<PathBuf>) -> Result<Self> {
        let db_path = resolve_db_path(db_override)?;
        let pool = create_pool(&db_path).await?;
        run_migrations(&pool).await?;
        tracing::debug!(database = %db_path.display(), "Database ready");

        Ok(Self { db_path, pool })
    }

    pub async fn config(&self) -> Result<AppConfig> {
        AppConfig::resolve(&self.pool).await
    }

    pub async fn completion_client(&self) -> Result<Arc<dyn CompletionClient>> {
        client_from_config(self.config().await?.llm)
    }

    pub async fn subtask_generator(&self) -> Result<Arc<dyn SubtaskGenerator>> {
        Ok(Arc::new(LlmSubtaskGenerator::new(self.completion_client().await?)))
    }
}
