use anyhow::{Context, Result};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shortcash::api::create_api_router;
use shortcash::auth::AuthService;
use shortcash::config::{AuthMode, Config, DatabaseBackend, TrustedProxyMode};
use shortcash::redirect::create_redirect_router;
use shortcash::storage::{PostgresStorage, SqliteStorage, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("shortcash=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    info!("Loaded configuration");

    let storage: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.database.url);
            Arc::new(
                SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
            )
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage");
            Arc::new(
                PostgresStorage::new(&config.database.url, config.database.max_connections)
                    .await?,
            )
        }
    };

    info!("Initializing database...");
    storage.init().await.context("failed to initialize database")?;
    info!("Database initialized successfully");

    let auth_service = Arc::new(AuthService::new(config.auth.mode, Arc::clone(&storage)));

    match auth_service.mode() {
        AuthMode::None => {
            info!("🔓 API keys disabled - callers are identified by the X-User-Id header");
        }
        AuthMode::ApiKey => {
            info!("🔐 API key authentication enabled");
        }
    }

    match config.client_ip.trusted_proxy_mode {
        TrustedProxyMode::None => info!("Client IPs taken from socket addresses"),
        TrustedProxyMode::Standard => info!(
            "Client IPs taken from forwarding headers ({} trusted proxy ranges, {:?} hops)",
            config.client_ip.trusted_proxies.len(),
            config.client_ip.num_trusted_proxies
        ),
        TrustedProxyMode::Cloudflare => info!("Client IPs taken from CF-Connecting-IP"),
    }

    let api_router = create_api_router(
        Arc::clone(&storage),
        auth_service,
        config.client_ip.clone(),
        &config.cors,
    );
    let redirect_router = create_redirect_router(Arc::clone(&storage), config.client_ip.clone());

    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API server to {}", api_addr))?;
    info!("🚀 API server listening on http://{}", api_addr);

    let redirect_addr = format!(
        "{}:{}",
        config.redirect_server.host, config.redirect_server.port
    );
    let redirect_listener = TcpListener::bind(&redirect_addr)
        .await
        .with_context(|| format!("failed to bind redirect server to {}", redirect_addr))?;
    info!("🚀 Redirect server listening on http://{}", redirect_addr);

    tokio::try_join!(
        axum::serve(
            api_listener,
            api_router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .into_future(),
        axum::serve(
            redirect_listener,
            redirect_router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .into_future(),
    )?;

    info!("Servers stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
