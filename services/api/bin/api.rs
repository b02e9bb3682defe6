//! Main Entrypoint for the Tutor-ia API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading agent instructions and building the scenario catalog.
//! 3. Initializing shared services (credentials, transport, preferences).
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use std::{collections::HashMap, fs, net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use tutoria_api::{
    config::Config,
    credential::HttpCredentialProvider,
    preferences::JsonFilePreferenceStore,
    router::create_router,
    state::AppState,
    transport::OpenAiConnector,
};
use tutoria_core::scenario::ScenarioCatalog;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", e);
        return;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// A helper function to load prompts from a directory, keyed by file stem.
fn load_prompts(prompts_path: &std::path::Path) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    for entry in std::fs::read_dir(prompts_path)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            prompts.insert(prompt_key, content);
        }
    }
    Ok(prompts)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Build the Scenario Catalog ---
    let prompts = match load_prompts(&config.prompts_path) {
        Ok(prompts) => prompts,
        Err(e) => {
            warn!(path = %config.prompts_path.display(), error = ?e, "Could not read prompts directory");
            HashMap::new()
        }
    };
    let catalog = ScenarioCatalog::builtin().with_instructions(|agent| prompts.get(agent).cloned());
    info!(prompts = prompts.len(), "Scenario catalog ready.");

    // --- 4. Initialize Shared Services ---
    let preferences = JsonFilePreferenceStore::open(&config.preferences_path, &config.default_model).await;
    let app_state = Arc::new(AppState {
        catalog: Arc::new(catalog),
        credentials: Arc::new(HttpCredentialProvider::new(config.credential_endpoint.clone())),
        connector: Arc::new(OpenAiConnector::new(config.realtime_url.clone())),
        preferences: Arc::new(preferences),
        config: Arc::new(config.clone()),
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        credential_endpoint = %config.credential_endpoint,
        realtime_url = %config.realtime_url,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
