//! ORCID Link Service
//!
//! Single-binary service that links platform accounts to ORCID accounts:
//! 1. Drives the browser-redirect OAuth linking flow against ORCID
//! 2. Persists the resulting credential link
//! 3. Keeps stored token sets valid via retirement-driven refresh
//! 4. Enforces ownership and the manager role on every operation

mod api;
mod config;
mod error;
mod metrics;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use linkstore::LinkStore;
use orcid::OrcidOAuthClient;
use orcid_link::{LinkManager, SessionManager};
use platform_auth::AuthVerifier;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// How long to wait for in-flight requests after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting orcid-link-service");

    // Install the Prometheus recorder before any counters are touched
    let prometheus_handle = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let mut config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.service.listen_addr,
        auth_base_url = %config.auth.base_url,
        orcid_oauth_base_url = %config.orcid.oauth_base_url,
        data_dir = %config.storage.data_dir.display(),
        "configuration loaded"
    );

    let Some(client_secret) = config.orcid.client_secret.take() else {
        anyhow::bail!("configuration loaded without an ORCID client secret");
    };

    // One HTTP client for all upstream calls, with the fixed per-call timeout
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.service.timeout_secs))
        .build()
        .context("building HTTP client")?;

    let store = Arc::new(
        LinkStore::open(&config.storage.data_dir)
            .await
            .context("opening link store")?,
    );

    let orcid_client = Arc::new(OrcidOAuthClient::new(
        http.clone(),
        config.orcid.oauth_base_url.clone(),
        config.orcid.client_id.clone(),
        client_secret,
        config.orcid.redirect_uri.clone(),
    ));

    let verifier = Arc::new(AuthVerifier::new(
        http,
        config.auth.base_url.clone(),
        config.auth.cache_max_entries,
        Duration::from_secs(config.auth.cache_default_ttl_secs),
    ));

    let session_lifetime = Duration::from_secs(config.linking.session_lifetime_secs);
    let retirement_age = Duration::from_secs(config.linking.retirement_age_secs);

    let state = api::AppState {
        verifier,
        sessions: Arc::new(SessionManager::new(
            store.clone(),
            orcid_client.clone(),
            session_lifetime,
            retirement_age,
        )),
        links: Arc::new(LinkManager::new(store, orcid_client, retirement_age)),
        manager_role: config.linking.manager_role.clone(),
        ui: config.ui.clone(),
        prometheus: prometheus_handle,
        started_at: Instant::now(),
    };

    let app = api::build_router(state, config.service.max_connections);

    let listener = TcpListener::bind(config.service.listen_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.service.listen_addr))?;

    info!(addr = %config.service.listen_addr, "accepting requests");

    // Graceful shutdown: stop accepting on SIGTERM/SIGINT, then drain
    // in-flight requests up to DRAIN_TIMEOUT so a slow client cannot
    // block process exit.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
