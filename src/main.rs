use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use management_api::api::routes::{create_router, AppState};
use management_api::capability::Capabilities;
use management_api::client::ServiceClient;
use management_api::config::Config;
use management_api::task::{open_store, TaskRecorder};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("Management API stopped: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let addr = config.listen_addr()?;

    tracing::info!("Management API v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Uploads served from {}", config.uploads.root.display());

    let store = open_store(&config).await?;
    let client = ServiceClient::new(config.request_timeout)?;
    let capabilities = Capabilities::from_config(&config, client, TaskRecorder::new(store.clone()));

    let state = Arc::new(AppState::new(capabilities, store, &config));
    let app = create_router(state, &config);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Starting server on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
