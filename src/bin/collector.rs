use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use guardia_collector::{
    config::read_config_file,
    monitors::{probe::NetworkProber, system::SysinfoSource},
    supervisor::{Monitor, MonitorSettings, open_backend},
    util::{get_config_path, get_log_filter},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// Time given to collectors and the health checker to finish after a signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Collects CPU and memory metrics and watches server reachability")]
struct Args {
    /// Config file (defaults to $GM_CONFIG, then config.json)
    #[arg(short, long)]
    file: Option<String>,
}

fn init() {
    let default_filter = filter::Targets::new().with_targets(vec![
        ("guardia_collector", LevelFilter::INFO),
        ("collector", LevelFilter::INFO),
    ]);

    let filter = match get_log_filter() {
        Some(directives) => filter::Targets::from_str(&directives).unwrap_or_else(|e| {
            eprintln!("ignoring invalid GUARDIA_LOG value '{directives}': {e}");
            default_filter
        }),
        None => default_filter,
    };

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
    dotenv::dotenv().ok();
    init();

    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config_path = args.file.unwrap_or_else(get_config_path);
    let config = read_config_file(&config_path)?;
    info!("loaded {} server(s) from {config_path}", config.servers.len());

    let backend = open_backend(&config.storage()).await?;
    let prober = Arc::new(NetworkProber::new(config.health.timeout())?);
    let settings = MonitorSettings::from(&config);

    let cancel = CancellationToken::new();
    let monitor = Monitor::start(
        backend.clone(),
        &config.servers,
        &settings,
        || Arc::new(SysinfoSource::new()),
        prober,
        &cancel,
    )
    .await;

    shutdown_signal().await;

    info!("shutting down");
    if let Err(e) = monitor.shutdown(SHUTDOWN_GRACE).await {
        warn!("{e}");
    }

    match backend.get_stats().await {
        Ok(stats) => info!("{stats}"),
        Err(e) => warn!("failed to read storage stats: {e}"),
    }

    if let Err(e) = backend.close().await {
        error!("failed to close storage: {e}");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {e}");
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
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
