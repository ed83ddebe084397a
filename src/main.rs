use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::TimeDelta;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use airprox::aggregator::Aggregator;
use airprox::config::{Config, config_path};
use airprox::geometry::Cartesian;
use airprox::ingest::MessageProcessor;
use airprox::reporter::{LogSnapshotSink, Reporter};
use airprox::sbs::{SbsClient, SbsClientConfig};
use airprox::sweeper::Sweeper;
use airprox::track_log::TrackLogWriter;
use airprox::tracker::TrackStore;

#[derive(Parser, Debug)]
#[command(
    name = "airprox",
    about = "Tracks ADS-B aircraft and their closest approach to a reference point",
    version
)]
struct Cli {
    /// Config file path (default: $AIRPROX_CONFIG, /etc/airprox/airprox.toml,
    /// ./airprox.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// SBS server as host:port, overriding the config file
    #[arg(long)]
    sbs: Option<String>,

    /// Reference point latitude in degrees, overriding the config file
    #[arg(long)]
    lat: Option<f64>,

    /// Reference point longitude in degrees, overriding the config file
    #[arg(long)]
    lon: Option<f64>,

    /// Finalized-track log path, overriding the config file
    #[arg(long)]
    track_log: Option<PathBuf>,
}

/// Parse a "host:port" string into (hostname, port).
fn parse_server_address(addr: &str) -> Result<(String, u16)> {
    let (host, port) = addr
        .rsplit_once(':')
        .with_context(|| format!("invalid server address '{addr}' - expected 'host:port'"))?;
    let port = port
        .parse::<u16>()
        .with_context(|| format!("invalid port in '{addr}'"))?;
    Ok((host.to_string(), port))
}

fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli.config.clone().unwrap_or_else(config_path);
    let mut config = if path.exists() {
        info!("loading config from {}", path.display());
        Config::load(&path)?
    } else if let (Some(lat), Some(lon)) = (cli.lat, cli.lon) {
        info!("no config file at {}, using defaults", path.display());
        Config::with_reference(lat, lon)
    } else {
        anyhow::bail!(
            "no config file at {} and no --lat/--lon given",
            path.display()
        );
    };

    if let Some(lat) = cli.lat {
        config.reference.latitude = lat;
    }
    if let Some(lon) = cli.lon {
        config.reference.longitude = lon;
    }
    if let Some(sbs) = &cli.sbs {
        let (host, port) = parse_server_address(sbs)?;
        config.sbs.host = host;
        config.sbs.port = port;
    }
    if let Some(track_log) = &cli.track_log {
        config.track_log_path = track_log.clone();
    }
    Ok(config)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
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
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let bands = config.distance_bands()?;

    let reference = Cartesian::from_geodetic(
        config.reference.latitude,
        config.reference.longitude,
        0.0,
    );
    info!(
        lat = config.reference.latitude,
        lon = config.reference.longitude,
        "reference point configured"
    );

    let store = Arc::new(TrackStore::new(reference));
    let aggregator = Arc::new(Aggregator::new(bands));
    let track_log = Arc::new(TrackLogWriter::open(&config.track_log_path).await?);

    // Each long-running activity gets its own token so shutdown can stop
    // ingestion first, then the sweeper, then the reporter, joining each
    // before moving on.
    let ingest_cancel = CancellationToken::new();
    let sweep_cancel = CancellationToken::new();
    let report_cancel = CancellationToken::new();

    let client = SbsClient::new(
        SbsClientConfig::from(&config.sbs),
        MessageProcessor::new(store.clone(), aggregator.clone()),
    );
    let mut ingest_handle = {
        let cancel = ingest_cancel.clone();
        tokio::spawn(async move { client.run(cancel).await })
    };

    let sweeper = Sweeper::new(
        store.clone(),
        aggregator.clone(),
        track_log,
        TimeDelta::seconds(config.inactivity_threshold_seconds as i64),
        Duration::from_secs(config.sweep_interval_seconds),
    );
    let sweep_handle = {
        let cancel = sweep_cancel.clone();
        tokio::spawn(async move { sweeper.run(cancel).await })
    };

    let reporter = Reporter::new(
        store,
        aggregator,
        Arc::new(LogSnapshotSink),
        Duration::from_secs(config.report_interval_seconds),
    );
    let report_handle = {
        let cancel = report_cancel.clone();
        tokio::spawn(async move { reporter.run(cancel).await })
    };

    // Run until a termination signal arrives or the ingest task dies;
    // losing the upstream source for good is fatal to the whole process.
    let mut ingest_done = false;
    tokio::select! {
        _ = shutdown_signal() => {
            info!("termination signal received, shutting down");
        }
        result = &mut ingest_handle => {
            ingest_done = true;
            match result {
                Ok(Ok(())) => info!("ingest loop finished, shutting down"),
                Ok(Err(e)) => error!("ingest loop failed: {e:#}"),
                Err(e) => error!("ingest task panicked: {e}"),
            }
        }
    }

    // Ordered shutdown: no component may observe a store mutated by
    // something already torn down.
    ingest_cancel.cancel();
    if !ingest_done {
        if let Err(e) = ingest_handle.await {
            error!("ingest task panicked: {e}");
        }
    }
    sweep_cancel.cancel();
    if let Err(e) = sweep_handle.await {
        error!("sweeper task panicked: {e}");
    }
    report_cancel.cancel();
    if let Err(e) = report_handle.await {
        error!("reporter task panicked: {e}");
    }

    info!("shutdown complete");
    Ok(())
}
