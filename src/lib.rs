pub mod error;
pub mod models;
pub mod modules;
pub mod proxy; // CORS relay service
pub mod utils;

use error::AppResult;
use modules::logger;
use proxy::key_store::{build_key_store, generate_api_key};
use proxy::server::AppState;
use proxy::AxumServer;
use tracing::info;

/// Load config, start the relay and serve until Ctrl-C
pub async fn run() -> AppResult<()> {
    let config_path = modules::get_config_path()?;
    let first_run = !config_path.exists();
    let mut config = modules::load_app_config_from(&config_path)?;

    // Keep the guard alive so buffered log lines reach the file
    let _log_guard = logger::init_logger(config.log_dir.as_deref());

    if first_run {
        // Seed an unrestricted key so a fresh install is usable
        if let proxy::config::KeyStoreConfig::Memory { keys } = &mut config.proxy.key_store {
            let key = generate_api_key();
            keys.insert(key.clone(), serde_json::Value::Bool(true));
            info!("Generated API key {} (no restrictions)", key);
        }
        modules::save_app_config_to(&config, &config_path)?;
        info!("Wrote default config to {}", config_path.display());
    }

    let store = build_key_store(&config.proxy.key_store)?;
    let state = AppState::new(&config.proxy, store)?;
    let (server, handle) = AxumServer::start(
        config.proxy.get_bind_address(),
        config.proxy.port,
        state,
    )
    .await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    server.stop();
    handle.await.ok();

    Ok(())
}
