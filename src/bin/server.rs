use log::{error, info, warn};
use std::net::SocketAddr;

use vet_clinic::config::ServerConfig;
use vet_clinic::core::{shutdown_on, AppState};
use vet_clinic::handlers::api_routes;
use vet_clinic::storage::Repositories;

#[tokio::main]
async fn main() {
    // Initialize env
    let dotenv_result = dotenvy::dotenv();

    // Initialize logging
    env_logger::init();

    match dotenv_result {
        Ok(path) => info!("Environment variables loaded from {}", path.display()),
        Err(e) => warn!("Failed to load .env file: {}", e),
    };

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Configuration: host={}, port={}, database={}, roles_enabled={}",
        config.host, config.port, config.database_url, config.roles_enabled
    );

    // One store for the whole process, injected into every service
    let repositories = match Repositories::connect(&config.database_url).await {
        Ok(repositories) => repositories,
        Err(e) => {
            error!("Failed to open storage {}: {}", config.database_url, e);
            std::process::exit(1);
        }
    };
    let state = AppState::new(&config, repositories);

    if let Err(e) = state.bootstrap(&config).await {
        error!("Failed to create bootstrap admin: {}", e);
        std::process::exit(1);
    }

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting Vet Clinic server on {}", addr);

    let shutdown = shutdown_on(tokio::signal::ctrl_c());

    let (bound, server) =
        match warp::serve(api_routes(state)).try_bind_with_graceful_shutdown(addr, shutdown) {
            Ok(bound) => bound,
            Err(e) => {
                error!("Failed to bind {}: {}", addr, e);
                std::process::exit(1);
            }
        };

    info!("Listening on {}", bound);
    server.await;
    info!("Server stopped");
}
