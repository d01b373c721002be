use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn, Level};

use ukigumo_agent::{router, AgentConfig, AppState, Args, RunRegistry, WorkerPool, WorkerSettings};
use ukigumo_core::{HttpReporter, ReporterConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(1);
        }
    };

    if args.version {
        eprintln!("ukigumo-agent: {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    ukigumo_core::telemetry::init_tracing(args.json, level);

    let result = match args.into_config() {
        Ok(config) => serve(config).await,
        Err(e) => Err(e.into()),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn serve(config: AgentConfig) -> Result<()> {
    let settings = WorkerSettings::from(&config);
    settings.workspace.ensure_root()?;
    info!("working directory is: {}", config.workdir.display());

    let reporter = HttpReporter::new(
        &config.endpoint,
        ReporterConfig {
            timeout: Some(config.report_timeout),
            ..ReporterConfig::default()
        },
    )
    .context("Invalid --endpoint")?;
    info!(endpoint = %reporter.endpoint(), workers = config.workers, "Reporting to collector");

    let registry = Arc::new(RunRegistry::new());
    let workers = WorkerPool::new(settings, Arc::clone(&registry), Arc::new(reporter));
    let app = router(AppState::new(registry, workers.clone()));

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    info!(addr = %config.listen, "Starting server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!(active = workers.active(), "Server stopped, waiting for in-flight runs");
    if !workers.wait_idle(config.shutdown_grace).await {
        warn!(active = workers.active(), "Shutdown grace expired, abandoning runs");
    }
    info!("Graceful shutdown complete");
    Ok(())
}

/// Resolves on SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl-C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
