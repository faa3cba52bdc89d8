use anyhow::bail;

use crate::cli::{utils, OutputFormat};
use crate::config::{AppConfig, StoreBackend};
use crate::database::DatabaseManager;

pub async fn handle(config: AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    if config.store != StoreBackend::Postgres {
        bail!("migrations only apply to STORE_BACKEND=postgres");
    }
    let pool = DatabaseManager::connect(&config.database)?;
    DatabaseManager::migrate(&pool).await?;
    utils::output_success(&output_format, "Database migrations applied", None)
}
