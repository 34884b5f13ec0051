use std::{env, sync::Arc};

use colored::Colorize;
use log::{error, info};
use tavern_collab::{AuthError, Collab, DefaultInputs, StaticAuthenticator};
use tavern_core::{Config, SystemClock};
use tavern_server::{run_server, ServerContext, ServerError};
use thiserror::Error;
use tokio::runtime;

mod logging;

/// Where the token table is read from when `TAVERN_TOKENS` is not set
const DEFAULT_TOKENS_PATH: &str = "tokens.json";

#[derive(Debug, Error)]
enum TavernError {
    #[error("Could not load tokens: {0}")]
    Auth(#[from] AuthError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl TavernError {
    fn hint(&self) -> String {
        match self {
            TavernError::Auth(_) => format!("Make sure TAVERN_TOKENS points to a JSON file mapping tokens to users (defaults to {}).", DEFAULT_TOKENS_PATH),
            TavernError::Config(_) => "Check the TAVERN_* environment variables.".to_string(),
            TavernError::Server(ServerError::InvalidPort(_)) => "TAVERN_SERVER_PORT must be a number between 1 and 65535.".to_string(),
            TavernError::Server(_) => "The server stopped unexpectedly. Make sure the port is not already in use.".to_string(),
            TavernError::Fatal(_) => "This error is fatal, and should not happen.".to_string(),
        }
    }
}

fn config_from_env() -> Result<Config, TavernError> {
    let mut config = Config::default();

    if let Ok(ttl) = env::var("TAVERN_LOCATOR_TTL") {
        config.locator_ttl_in_seconds = ttl.parse().map_err(|_| {
            TavernError::Config(format!(
                "TAVERN_LOCATOR_TTL must be a number of seconds, got {}",
                ttl
            ))
        })?;
    }

    Ok(config)
}

fn start() -> Result<(), TavernError> {
    let config = config_from_env()?;

    let tokens_path = env::var("TAVERN_TOKENS").unwrap_or_else(|_| DEFAULT_TOKENS_PATH.to_string());
    let auth = StaticAuthenticator::from_file(tokens_path)?;

    info!("Building async runtime...");
    let runtime = runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("tavern-async")
        .build()
        .map_err(|e| TavernError::Fatal(e.to_string()))?;

    let collab = Collab::new(config, Arc::new(SystemClock), Arc::new(DefaultInputs));
    let context = ServerContext {
        collab: Arc::new(collab),
        auth: Arc::new(auth),
    };

    info!("Initialized successfully.");
    runtime.block_on(run_server(context))?;

    Ok(())
}

fn main() {
    if let Err(error) = logging::init_logger() {
        eprintln!("Could not initialize logging: {}", error);
    }

    if let Err(error) = start() {
        error!("{} Read the error below to troubleshoot the issue. If you think this might be a bug, please report it by making a GitHub issue.", "Tavern failed to start!".bold().red());
        error!("{}", error);
        error!("{}", format!("Hint: {}", error.hint()).dimmed().italic());
    }
}
