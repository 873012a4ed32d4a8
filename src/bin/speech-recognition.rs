use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use management_api::config::Config;
use management_api::recognizer::{create_router, RecognizerState};
use management_api::task::open_store;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("Speech recognition worker stopped: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let addr = config.recognizer_addr()?;

    let state = Arc::new(RecognizerState {
        store: open_store(&config).await?,
        delay: config.recognizer.delay,
    });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Speech recognition worker listening on http://{}", addr);

    axum::serve(listener, create_router(state)).await?;
    Ok(())
}
