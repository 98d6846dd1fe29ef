use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sitewatch::{
    AlertManager, HttpProbe, Monitor, PrometheusMetrics,
    config::{Config, read_config_file},
    server::spawn_metrics_server,
    smtp::SmtpNotifier,
};
use tracing::{info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(version, about)]
struct Args {
    /// JSON config file (the environment and `.env` files are used otherwise)
    #[arg(short, long)]
    file: Option<String>,

    /// Log level for sitewatch
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,
}

fn init(level: LevelFilter) {
    let filter = filter::Targets::new().with_targets(vec![
        ("sitewatch", level),
        ("tower_http", level),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init(args.log_level);
    trace!("started with args: {args:?}");

    let config = match &args.file {
        Some(path) => read_config_file(path)?,
        None => Config::from_env()?,
    };
    config.log_summary();

    let metrics = Arc::new(PrometheusMetrics::new().context("failed to register metrics")?);

    let alerts = match &config.smtp {
        Some(smtp) => AlertManager::new(Arc::new(SmtpNotifier::new(smtp)?)),
        None => {
            warn!("no smtp server configured, alerts will only be logged");
            AlertManager::disabled()
        }
    };

    let probe = HttpProbe::new(config.request_timeout).context("failed to build http client")?;

    spawn_metrics_server(config.metrics_addr, metrics.clone())
        .await
        .with_context(|| format!("failed to bind metrics server on {}", config.metrics_addr))?;

    let monitor = Monitor::new(config.monitor_config(), Arc::new(probe), metrics, alerts);
    let handle = monitor.spawn();

    shutdown_signal().await;
    info!("shutting down...");

    handle.shutdown().await.context("monitor task failed")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {e}");
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
                warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
