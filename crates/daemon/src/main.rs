//! Shift Swap Engine - Main Entry Point
//! JSON-RPC server over the tiered shift store

mod config;
mod telemetry;

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// Import workspace crates
use crate::config::{DaemonConfig, LogFormat};
use shiftswap_api_rpc::rate_limiter::RateLimiter;
use shiftswap_api_rpc::{RpcHandler, RpcServer, RpcServerConfig};
use shiftswap_core::application::{FeedbackService, LifecycleEngine, ShiftStore};
use shiftswap_core::port::id_provider::UuidProvider;
use shiftswap_core::port::time_provider::SystemTimeProvider;
use shiftswap_infra_local::FileKeyValueStore;
use shiftswap_infra_sqlite::{
    create_lazy_pool, run_migrations, SqliteFeedbackRepository, SqliteShiftRepository,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

type BoxedLayer = Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>;

fn fmt_layer<W>(format: LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'a> fmt::MakeWriter<'a> + Send + Sync + 'static,
{
    match format {
        // Production: JSON structured logging
        LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
        // Development: Pretty formatting with colors
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_ansi(ansi)
            .with_writer(writer)
            .boxed(),
    }
}

/// Install the global subscriber; the guard must live until exit
fn init_logging(cfg: &DaemonConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("shiftswap=info"))?;

    let mut layers: Vec<BoxedLayer> = vec![fmt_layer(cfg.log_format, std::io::stdout, true)];

    let guard = match &cfg.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "shiftswap.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(fmt_layer(cfg.log_format, writer, false));
            Some(guard)
        }
        None => None,
    };

    let telemetry_error = match telemetry::otel_layer() {
        Ok(Some(layer)) => {
            layers.push(layer);
            None
        }
        Ok(None) => None,
        Err(e) => Some(e),
    };

    tracing_subscriber::registry()
        .with(layers.with_filter(env_filter))
        .try_init()?;

    if let Some(e) = telemetry_error {
        warn!(error = %e, "Failed to initialize OpenTelemetry (continuing without it)");
    }

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration
    let cfg = DaemonConfig::load()?;

    // 2. Initialize logging
    let _log_guard = init_logging(&cfg)?;
    info!(core = shiftswap_core::VERSION, "Shift Swap Engine v{} starting...", VERSION);
    info!(
        database_url = %cfg.database_url,
        data_dir = %cfg.data_dir.display(),
        "Configuration loaded"
    );

    // 3. Primary backend: connects lazily so the daemon starts while it is down
    if let Err(e) = tokio::fs::create_dir_all(&cfg.data_dir).await {
        warn!(error = %e, dir = %cfg.data_dir.display(), "Failed to create data directory");
    }
    let pool = create_lazy_pool(&cfg.database_url)?;
    if let Err(e) = run_migrations(&pool).await {
        error!(error = %e, "Primary backend unavailable at startup; writes will fall back to the local store");
    }

    // 4. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);
    let local_store = Arc::new(FileKeyValueStore::new(cfg.data_dir.clone()));

    let store = Arc::new(ShiftStore::new(
        Arc::new(SqliteShiftRepository::new(pool.clone())),
        local_store,
    ));
    let engine = Arc::new(LifecycleEngine::new(
        store,
        id_provider,
        time_provider.clone(),
    ));
    let feedback = Arc::new(FeedbackService::new(
        Arc::new(SqliteFeedbackRepository::new(pool.clone())),
        time_provider,
    ));

    // 5. Start JSON-RPC server
    let handler = RpcHandler::new(
        engine,
        feedback,
        RateLimiter::new(cfg.rate_limit_burst, cfg.rate_limit_rate),
    );
    let rpc_config = RpcServerConfig {
        host: cfg.rpc_host.clone(),
        port: cfg.rpc_port,
    };
    let (addr, rpc_handle) = RpcServer::new(rpc_config, handler)
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!(addr = %addr, "System ready. Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 7. Graceful shutdown
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    rpc_handle.stopped().await;
    pool.close().await;

    info!("Shutdown complete.");
    Ok(())
}
