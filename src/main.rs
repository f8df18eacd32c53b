//! Sessionpage - server-side session state over HTTP

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sessionpage::{
    api::{self, AppState},
    config::Config,
    services::SessionService,
    store::create_store,
    views::PageRenderer,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sessionpage=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting sessionpage...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Session storage
    let timeout = Duration::from_secs(config.session.timeout_seconds);
    let store = create_store(&config.store, timeout).await?;
    tracing::info!(
        "Session store initialized: {:?} (timeout {}s)",
        config.store.driver,
        timeout.as_secs()
    );

    let session_service = Arc::new(SessionService::new(store));
    let renderer = Arc::new(PageRenderer::new().context("Failed to load page templates")?);

    // Periodic sweep of expired sessions
    if config.session.sweep_interval_seconds > 0 {
        let service = session_service.clone();
        let every = Duration::from_secs(config.session.sweep_interval_seconds);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                match service.purge_expired().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::info!("Purged {} expired sessions", removed),
                    Err(e) => tracing::warn!("Session sweep failed: {}", e),
                }
            }
        });
    }

    let state = AppState::new(
        session_service,
        renderer,
        config.session.cookie_name.as_str(),
    );

    // Build router
    let app = api::build_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
