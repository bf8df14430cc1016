mod app;
mod config;
mod domain;
mod error;
mod logging;
mod middleware;
mod routes;
mod services;
#[cfg(test)]
mod test_support;

use anyhow::Result;

use services::{CompletionClient, ContractStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = config::Settings::from_env()?;

    // Initialize logging
    logging::init_logging(&settings.env);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        "Starting contract review backend"
    );

    // Create completion API client
    let completion = CompletionClient::new(&settings.completion)?;
    if !completion.is_configured() {
        tracing::warn!("DEEPSEEK_API_KEY is not set - contract analysis will be unavailable");
    }

    // Prepare upload storage
    let store = ContractStore::open(&settings.upload_dir).await?;

    // Create application state
    let state = app::AppState::new(settings.clone(), completion, store);

    // Build application
    let app = app::create_app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
