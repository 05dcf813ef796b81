use log::{error, info, warn};
use service::{config::Config, logging::Logger, AppState};

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    info!(
        "Starting campaign hub [{}] on {}",
        config.runtime_env(),
        config.bind_address()
    );

    let app_state = AppState::new(config);

    // Dropping the watchers stops them, so they live until the server exits.
    let _watchers = match service::start_watchers(&app_state) {
        Ok(watchers) => watchers,
        Err(e) => {
            error!("Failed to start asset directory watchers: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = web::init_server(app_state, shutdown_signal()).await {
        error!("Server failed: {e}");
        std::process::exit(1);
    }

    info!("Server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Unable to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
