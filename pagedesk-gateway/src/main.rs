//! Pagedesk Gateway
//!
//! Backend gateway for the pagedesk social-page dashboard: access-control
//! evaluation over page relations, the OAuth account-connection flow,
//! session-token lifecycle, and privileged user administration.

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pagedesk_gateway::{
    routes, AppState, Config, HttpIdentityProvider, HttpPlatformClient, SqliteStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pagedesk_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    tracing::info!(port = config.port, db = %config.db_path, "Loaded configuration");

    // Open the store
    let store = SqliteStore::open(&config.db_path)
        .map_err(|e| anyhow::anyhow!("failed to open store: {}", e))?;

    // External collaborators
    let platform = HttpPlatformClient::new(
        config.graph_base_url.clone(),
        config.app_id.clone(),
        config.app_secret.clone(),
        config.oauth_redirect_uri.clone(),
    );
    let identity = HttpIdentityProvider::new(
        config.identity_base_url.clone(),
        config.identity_service_key.clone(),
    );

    // Create app state
    let state = Arc::new(AppState::new(
        store,
        platform,
        identity,
        config.token_config(),
        config.webhook_allowlist.clone(),
    ));

    // Create router
    let app = routes::create_router(state, &config.allowed_origins);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Gateway listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
