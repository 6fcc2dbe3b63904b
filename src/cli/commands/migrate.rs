use crate::cli::utils::{connect_store, output_success};
use crate::cli::OutputFormat;
use crate::config;
use crate::database::DatabaseManager;

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let store = connect_store(config::config()).await?;
    DatabaseManager::migrate(store.pool()).await?;
    output_success(&output_format, "Migrations applied", None)
}
