//! `cruisequote` -- import worker.
//!
//! Polls the job store for pending imports and runs each through the
//! extraction pipeline until interrupted.
//!
//! # Environment variables
//!
//! | Variable             | Required | Default            | Description                  |
//! |----------------------|----------|--------------------|------------------------------|
//! | `CRUISEQUOTE_CONFIG` | no       | built-in defaults  | Path to the JSON config file |
//! | `RUST_LOG`           | no       | `cruisequote=info` | Log filter                   |

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cruisequote::config::{load_config, load_config_from_str, Config, LogFormat};
use cruisequote::db::Database;
use cruisequote::extraction::HttpModelClient;
use cruisequote::jobs::JobStore;
use cruisequote::pipeline::Pipeline;
use cruisequote::worker::{Scheduler, SchedulerConfig};
use cruisequote::CruiseQuoteError;

const CONFIG_ENV: &str = "CRUISEQUOTE_CONFIG";

#[tokio::main]
async fn main() -> ExitCode {
    let config = match read_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("cruisequote: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(config.logging.format);

    tracing::info!("Starting cruisequote v{}", env!("CARGO_PKG_VERSION"));

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "worker failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), CruiseQuoteError> {
    let db = Database::open(Path::new(&config.database_path))?;

    let api_key = config.model.resolve_api_key().map_err(cruisequote::ConfigError::from)?;
    let client = Arc::new(HttpModelClient::new(&config.model, api_key)?);
    tracing::info!(model = %config.model.model, "model client ready");

    let pipeline = Arc::new(Pipeline::from_database(db.clone(), client));
    let scheduler = Scheduler::new(
        JobStore::new(db),
        pipeline,
        SchedulerConfig::from_worker_config(&config.worker),
    );

    let cancel = CancellationToken::new();
    let worker = tokio::spawn(scheduler.run(cancel.clone()));

    shutdown_signal().await;
    cancel.cancel();

    match worker.await {
        Ok(result) => result?,
        Err(e) => tracing::error!(error = %e, "scheduler task failed"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// `--config <path>` wins over `CRUISEQUOTE_CONFIG`; with neither, the
/// built-in defaults apply.
fn read_config() -> Result<Config, CruiseQuoteError> {
    let mut args = std::env::args().skip(1);
    let mut path: Option<PathBuf> = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => path = args.next().map(PathBuf::from),
            other => {
                if let Some(value) = other.strip_prefix("--config=") {
                    path = Some(PathBuf::from(value));
                }
            }
        }
    }

    let path = path.or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
    let config = match path {
        Some(path) => load_config(path)?,
        None => load_config_from_str(r#"{ "version": "1.0" }"#)?,
    };
    Ok(config)
}

fn init_logging(format: LogFormat) {
    // Route `log` records (database layer) into tracing.
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("cruisequote: log bridge not installed: {}", e);
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cruisequote=info".into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Wait for SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT (Ctrl-C), shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
