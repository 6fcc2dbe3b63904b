use anyhow::anyhow;
use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::cli::utils::{connect_store, output_record, output_success};
use crate::cli::OutputFormat;
use crate::config;
use crate::database::OrganizationStore;
use crate::features::{FeatureCatalog, FeatureGate};

#[derive(Subcommand)]
pub enum FeatureCommands {
    #[command(about = "Upsert flags and plan defaults from the YAML catalog")]
    Seed {
        #[arg(long, help = "Catalog path (defaults to FEATURES_CATALOG_PATH)")]
        catalog: Option<String>,
    },

    #[command(about = "Validate the YAML catalog without touching the database")]
    Validate {
        #[arg(long, help = "Catalog path (defaults to FEATURES_CATALOG_PATH)")]
        catalog: Option<String>,
    },

    #[command(about = "Show the gate decision for one organization and feature")]
    Check {
        #[arg(long, help = "Organization id")]
        org: Uuid,
        #[arg(help = "Feature key")]
        key: String,
        #[arg(long, help = "Walk parent organizations for an override")]
        inherit: bool,
    },
}

pub async fn handle(cmd: FeatureCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config::config();

    match cmd {
        FeatureCommands::Seed { catalog } => {
            let path = catalog.unwrap_or_else(|| config.features.catalog_path.clone());
            let catalog = FeatureCatalog::load(&path)?;
            let store = connect_store(config).await?;
            let (flags, plan_features) = catalog.seed(&store).await?;
            output_success(
                &output_format,
                &format!("Seeded {} flag(s) and {} plan default(s) from {}", flags, plan_features, path),
                Some(json!({ "flags": flags, "plan_features": plan_features })),
            )
        }
        FeatureCommands::Validate { catalog } => {
            let path = catalog.unwrap_or_else(|| config.features.catalog_path.clone());
            let catalog = FeatureCatalog::load(&path)?;
            output_success(
                &output_format,
                &format!("{} is valid ({} flag(s))", path, catalog.flags.len()),
                Some(json!({ "flags": catalog.flags.len() })),
            )
        }
        FeatureCommands::Check { org, key, inherit } => {
            let store = connect_store(config).await?;
            let organization = store
                .find_organization(org)
                .await?
                .ok_or_else(|| anyhow!("organization {} not found", org))?;

            let gate = FeatureGate::new(&store, &config.features);
            let decision = if inherit {
                gate.is_enabled_inherited(&organization, &key).await?
            } else {
                gate.is_enabled(&organization, &key).await?
            };
            output_record(&output_format, &serde_json::to_value(&decision)?)
        }
    }
}
