//! TMS server entry point.

use std::process::ExitCode;

use tms_db::DbManager;
use tms_dispatch::GoogleDistanceMatrix;
use tms_server::config::{Cli, Command};
use tms_server::{AppState, StartupError, bootstrap, logging, server};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::load();

    if let Err(e) = logging::init(&cli.config) {
        eprintln!("Failed to initialise logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "TMS server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), StartupError> {
    let config = cli.config;
    info!("Starting TMS server...");

    let db = DbManager::connect(&config.db_config()).await?;
    tms_db::run_migrations(db.client()).await?;

    let provider = config.google_api_key.clone().map(GoogleDistanceMatrix::new);
    if provider.is_none() {
        info!("No Google API key configured; using geodesic distances only");
    }
    let state = AppState::new(
        db.client().clone(),
        config.auth_config(),
        &config.mileage_config(),
        provider,
    );

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => server::serve(&config, state).await,
        Command::Bootstrap(args) => {
            let (organization, user) = bootstrap::run(&state, args).await?;
            println!("organization_id: {}", organization.id);
            println!("user_id: {}", user.id);
            println!("username: {}", user.username);
            Ok(())
        }
    }
}
