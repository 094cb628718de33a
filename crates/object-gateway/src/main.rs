//! Object Gateway
//!
//! Authenticated upload, download, delete and listing of per-user objects
//! in an S3 bucket.

use anyhow::Context;
use object_gateway::config::Config;
use object_gateway::observability::metrics::init_metrics_recorder;
use object_gateway::routes::{self, AppState};
use object_gateway::storage::S3ObjectStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default log filter when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "object_gateway=debug,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()
        .inspect_err(|e| error!(error = %e, "Invalid configuration"))
        .context("failed to load configuration")?;

    info!(
        region = %config.aws_region,
        bucket = %config.s3_bucket_name,
        issuer = %config.auth_issuer,
        audience_check = config.cognito_client_id.is_some(),
        namespace_root = %config.namespace_root,
        bind_address = %config.bind_address,
        "Starting Object Gateway"
    );

    let metrics_handle = init_metrics_recorder()
        .map_err(anyhow::Error::msg)
        .context("failed to install metrics recorder")?;

    let addr: SocketAddr = config
        .bind_address
        .parse()
        .with_context(|| format!("invalid bind address {}", config.bind_address))?;

    let store = Arc::new(S3ObjectStore::from_config(&config).await);
    let app = routes::build_routes(Arc::new(AppState::new(config, store)), metrics_handle);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "Object Gateway listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    info!("Object Gateway stopped");
    Ok(())
}

/// Resolves once SIGINT or SIGTERM arrives and the drain period has elapsed.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Cannot listen for SIGINT");
            std::future::pending::<()>().await;
        }
        "SIGINT"
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
        "SIGTERM"
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();

    let received = tokio::select! {
        name = interrupt => name,
        name = terminate => name,
    };
    info!(signal = received, "Shutting down");

    let drain = drain_period();
    if !drain.is_zero() {
        warn!(seconds = drain.as_secs(), "Draining in-flight requests");
        tokio::time::sleep(drain).await;
    }
}

/// `OG_DRAIN_SECONDS`, zero when unset or unparsable.
fn drain_period() -> Duration {
    std::env::var("OG_DRAIN_SECONDS")
        .ok()
        .and_then(|value| value.parse().ok())
        .map_or(Duration::ZERO, Duration::from_secs)
}
