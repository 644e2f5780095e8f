//! `habitsd` — the habits server binary.
//!
//! Usage:
//!   habitsd [-c <config.toml>]
//!
//! Without `-c`, the config path comes from `$HABITS_CONFIG`, falling
//! back to `./config.toml`. Exits non-zero on any startup failure; zero
//! on graceful shutdown.

mod config;
mod metrics;
mod routes;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tower::Layer;
use tower_http::normalize_path::NormalizePathLayer;
use tracing::info;

use auth::service::{AuthConfig, AuthService};
use config::ServerConfig;
use habits_store::{KvStore, Store};
use tracker::service::TrackerService;

/// Habits server.
#[derive(Parser, Debug)]
#[command(name = "habitsd", about = "Habits server")]
struct Cli {
    /// Path to the config file (default: $HABITS_CONFIG, then config.toml).
    #[arg(short = 'c', long = "config")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration before logging: the log level comes from it.
    let config_path = ServerConfig::resolve_path(cli.config.as_deref());
    let config = ServerConfig::load(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .init();
    info!("loaded configuration from {}", config_path.display());

    let metrics_handle = metrics::init_metrics();

    // Single process-wide store handle, closed on drop at shutdown.
    let kv = Arc::new(
        habits_kv::RedbStore::open(&config.db_path)
            .map_err(|e| anyhow::anyhow!("failed to open KV store: {e}"))?,
    );
    let store: Arc<dyn Store> = Arc::new(KvStore::new(kv));
    info!("database open at {}", config.db_path.display());

    let tracker_svc = TrackerService::new(store.clone());

    let auth_svc = if config.auth_enabled {
        let svc = AuthService::configure(
            config.oidc_providers.clone(),
            store.clone(),
            AuthConfig {
                session_ttl: Duration::from_secs(config.session_ttl_secs),
                refresh_cache_ttl: Duration::from_secs(config.session_ttl_secs),
            },
        )
        .await
        .map_err(|e| anyhow::anyhow!("auth setup failed: {e}"))?;
        svc.spawn_janitors();
        Some(svc)
    } else {
        info!("authentication is disabled; all data belongs to 'anonymous'");
        None
    };

    let router = routes::build_router(routes::AppContext {
        tracker: tracker_svc,
        auth: auth_svc,
        metrics: metrics_handle,
    });

    // Access log and slash normalisation wrap the whole router so they
    // run before routing decisions.
    let app = NormalizePathLayer::trim_trailing_slash().layer(router);
    let app = axum::middleware::from_fn(routes::access_log).layer(app);

    let addr: std::net::SocketAddr = config
        .listen_addr()
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid listen address {}: {e}", config.listen_addr()))?;

    if config.server.tls.enabled {
        let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(
            &config.server.tls.cert_file,
            &config.server.tls.key_file,
        )
        .await
        .map_err(|e| anyhow::anyhow!("failed to load TLS material: {e}"))?;

        let handle = axum_server::Handle::new();
        tokio::spawn({
            let handle = handle.clone();
            async move {
                shutdown_signal().await;
                handle.graceful_shutdown(Some(Duration::from_secs(10)));
            }
        });

        // axum-server hands the stack hyper's raw body type; box it into
        // axum's before the middleware stack sees it.
        let app = tower::util::MapRequestLayer::new(
            |req: axum::http::Request<hyper::body::Incoming>| req.map(axum::body::Body::new),
        )
        .layer(app);

        info!("habits server listening on https://{addr}");
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(
                axum::ServiceExt::<axum::http::Request<hyper::body::Incoming>>::into_make_service(
                    app,
                ),
            )
            .await?;
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("habits server listening on http://{addr}");
        axum::serve(
            listener,
            axum::ServiceExt::<axum::extract::Request>::into_make_service(app),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    }

    info!("shutdown complete");
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
