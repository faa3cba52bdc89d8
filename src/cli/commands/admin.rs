use anyhow::{anyhow, bail};
use clap::Args;
use serde_json::json;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth;
use crate::cli::{utils, OutputFormat};
use crate::config::{AppConfig, StoreBackend};
use crate::database::models::{user::normalize_email, User};
use crate::permissions::Role;
use crate::services::sessions::check_password_strength;

#[derive(Args)]
pub struct CreateAdminArgs {
    #[arg(long, help = "Login email")]
    pub email: String,

    #[arg(long, help = "Display name")]
    pub full_name: String,

    /// Falls back to ADMIN_PASSWORD so the secret stays out of shell history
    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true, help = "Initial password")]
    pub password: String,

    #[arg(long, help = "Organization the admin belongs to")]
    pub organization_id: Option<Uuid>,
}

pub async fn handle(args: CreateAdminArgs, config: AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    if config.store == StoreBackend::Memory {
        tracing::warn!("The in-memory store does not outlive this command");
    }
    check_password_strength(&args.password).map_err(|e| anyhow!("{}", e))?;

    let cost = config.security.bcrypt_cost;
    let state = AppState::from_config(config).await?;
    let email = normalize_email(&args.email);

    if state.store.find_user_by_email(&email).await?.is_some() {
        bail!("a user with email {} already exists", email);
    }
    if let Some(org) = args.organization_id {
        if state.store.get_organization(org).await?.is_none() {
            bail!("organization {} not found", org);
        }
    }

    let hash = auth::hash_password(&args.password, cost).await?;
    let mut user = User::new(&email, hash, args.full_name.trim(), Role::SuperAdmin, args.organization_id);
    user.membership_validated = true;
    state.store.insert_user(&user).await?;
    tracing::info!("Created SUPER_ADMIN {}", user.id);

    utils::output_success(
        &output_format,
        &format!("Created SUPER_ADMIN {}", user.email),
        Some(json!({ "id": user.id, "email": user.email })),
    )
}
