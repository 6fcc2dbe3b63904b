use chrono::Utc;
use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::auth::SessionResolver;
use crate::cli::utils::{connect_store, output_record, output_success};
use crate::cli::OutputFormat;
use crate::config;
use crate::types::Portal;

#[derive(Subcommand)]
pub enum SessionCommands {
    #[command(about = "Issue a session token for an existing principal")]
    Issue {
        #[arg(long, help = "Portal: dashboard, admin or gwi")]
        portal: Portal,
        #[arg(long, help = "User id (dashboard) or admin id (admin, gwi)")]
        principal: Uuid,
    },

    #[command(about = "Delete every expired session")]
    Sweep,

    #[command(about = "Revoke every session a principal holds on any portal")]
    RevokeAll {
        #[arg(help = "User or admin id")]
        principal: Uuid,
    },
}

pub async fn handle(cmd: SessionCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config::config();
    let store = connect_store(config).await?;
    let sessions = SessionResolver::new(&store, &config.session);

    match cmd {
        SessionCommands::Issue { portal, principal } => {
            let issued = sessions.issue(portal, principal).await?;
            output_record(
                &output_format,
                &json!({
                    "portal": issued.portal,
                    "cookie": config.session.cookie_name(portal),
                    "session_id": issued.session_id,
                    "token": issued.token,
                    "expires_at": issued.expires_at,
                }),
            )
        }
        SessionCommands::Sweep => {
            let count = sessions.sweep_expired(Utc::now()).await?;
            output_success(
                &output_format,
                &format!("Removed {} expired session(s)", count),
                Some(json!({ "removed": count })),
            )
        }
        SessionCommands::RevokeAll { principal } => {
            let count = sessions.revoke_all(principal).await?;
            output_success(
                &output_format,
                &format!("Revoked {} session(s) for {}", count, principal),
                Some(json!({ "revoked": count })),
            )
        }
    }
}
