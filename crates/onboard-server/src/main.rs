//! Onboarding server: connects the engine to SurrealDB and seeds the
//! administrator registry.

mod config;

use onboard_core::error::OnboardError;
use onboard_db::{DbError, DbManager};
use onboard_engine::AdminService;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{ConfigError, ServerConfig};

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Engine(#[from] OnboardError),
    #[error("signal handling failed: {0}")]
    Signal(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("onboard=info,info")),
        )
        .json()
        .init();

    info!("Starting onboarding server...");
    if let Err(e) = run().await {
        error!(error = %e, "Onboarding server failed");
        std::process::exit(1);
    }
    info!("Onboarding server stopped.");
}

async fn run() -> Result<(), StartupError> {
    let config = ServerConfig::from_env()?;

    let db = DbManager::connect(&config.db).await?;
    db.migrate().await?;

    let admins = AdminService::new(db.document_store(), config.engine.clone());
    for seed in &config.seed_admins {
        admins.bootstrap_admin(&seed.principal_id, &seed.email).await?;
    }

    info!(
        seeded_admins = config.seed_admins.len(),
        employee_id_prefix = %config.engine.employee_id_prefix,
        "Onboarding server ready"
    );
    tokio::signal::ctrl_c().await?;
    Ok(())
}
