//! moonwatch binary
//!
//! Tracks the Moon for the current observer and writes one JSON snapshot
//! per tick to stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! moonwatch --config moonwatch.json
//! MOONWATCH_EPHEMERIS_SOURCE=series moonwatch --no-geolocation
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Log filter directives, e.g. `moonwatch=debug` (default: info)
//! - `MOONWATCH_*`: per-field configuration overrides

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use moonwatch::ephemeris::ConfiguredLoader;
use moonwatch::location::{
    IpGeolocator, JsonLocationStore, LocationService, TcpReachability,
};
use moonwatch::runtime::{stop_channel, Runtime};
use moonwatch::{EngineConfig, JsonLinesSink};

#[derive(Parser)]
#[command(name = "moonwatch", about = "Real-time Moon tracker")]
struct Cli {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Stay at the configured default location
    #[arg(long)]
    no_geolocation: bool,
}

fn location_service(config: &EngineConfig) -> LocationService {
    let geo = &config.geolocation;
    let reachability = TcpReachability::new(geo.probe_addr.clone(), config.probe_timeout());
    let mut service = LocationService::new(Box::new(reachability), config.default_location.clone())
        .with_primary(Box::new(IpGeolocator::new(
            "primary",
            geo.ip_services.clone(),
            geo.lookup_url.clone(),
        )))
        .with_store(Box::new(JsonLocationStore::new(config.location_store_path())));
    if let Some(url) = &geo.secondary_lookup_url {
        service = service.with_secondary(Box::new(IpGeolocator::new(
            "secondary",
            geo.ip_services.clone(),
            url.clone(),
        )));
    }
    service
}

/// How long shutdown waits for a detached blocking task (a kernel load
/// or location lookup) before the process exits anyway.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// `RUST_LOG` directives when set and valid, INFO otherwise.
fn build_env_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(build_env_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run(cli));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = EngineConfig::load(cli.config.as_deref())?;
    if cli.no_geolocation {
        config.geolocation.enabled = false;
    }
    info!(
        "ephemeris source {:?}, tick every {} s",
        config.ephemeris.source, config.tick_secs
    );

    let loader = Arc::new(ConfiguredLoader::from_config(&config));
    let mut runtime = Runtime::new(config.clone(), loader);
    if config.geolocation.enabled {
        runtime = runtime.with_location_service(Arc::new(location_service(&config)));
    } else {
        info!("geolocation disabled, observer fixed at {}", config.default_location);
    }

    let (stop_tx, stop_rx) = stop_channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("interrupt received, shutting down"),
            Err(e) => warn!("failed to listen for Ctrl-C: {e}"),
        }
        let _ = stop_tx.send(true);
    });

    let stats = runtime
        .run(Box::new(JsonLinesSink::stdout()), stop_rx)
        .await;
    info!(
        "{} ticks, {} failed, {} location reports",
        stats.ticks, stats.failed_ticks, stats.location_reports
    );
    Ok(())
}
