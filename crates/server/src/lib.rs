pub mod api;
pub mod config;
pub mod logging;

use api::{AppState, DataStore};
use config::AppConfig;
use engine::platform::SystemClock;
use std::sync::Arc;

/// Bind the configured address and serve until Ctrl-C.
pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    let data = Arc::new(DataStore::new(&config.storage.data_path));
    let state = AppState {
        data: data.clone(),
        clock: Arc::new(SystemClock),
    };
    let app = api::router(state, config.server.cors_allow_any);

    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    let addr = listener.local_addr()?;
    tracing::info!(
        %addr,
        data = %data.path().display(),
        env = %config.dev_env,
        "autocare-server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for shutdown signal");
    }
}
