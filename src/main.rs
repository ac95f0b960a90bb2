use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shortqr::clicks::ClickRecorder;
use shortqr::config::Config;
use shortqr::services::Services;
use shortqr::storage::Stores;
use shortqr::{api, redirect};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    info!("Loaded configuration");

    info!("Initializing storage...");
    let stores = Stores::open(&config.database)
        .await?
        .with_link_cache(&config.cache);
    info!("Storage initialized successfully");

    let services = Services::new(&config, &stores);

    info!(
        "↪️  Redirect status: {} for safe links, {} for flagged links",
        config.redirect.safe.status_code(),
        config.redirect.unsafe_.status_code()
    );

    let api_router = api::create_api_router(
        Arc::clone(&services.shortener),
        &config.redirect_base_url,
    );
    let clicks: Arc<dyn ClickRecorder> = services.clicks.clone();
    let redirect_router = redirect::create_redirect_router(
        Arc::clone(&services.resolver),
        Arc::clone(&services.qr),
        clicks,
    );

    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("🚀 API server listening on http://{}", api_addr);

    let redirect_addr = format!(
        "{}:{}",
        config.redirect_server.host, config.redirect_server.port
    );
    let redirect_listener = tokio::net::TcpListener::bind(&redirect_addr).await?;
    info!("🚀 Redirect server listening on http://{}", redirect_addr);
    info!("   - Short links are published under {}", config.redirect_base_url);

    tokio::try_join!(
        axum::serve(
            api_listener,
            api_router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal()),
        axum::serve(
            redirect_listener,
            redirect_router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal()),
    )?;

    services.clicks.shutdown().await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
