use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde_json::json;
use tracing::{error, info, warn};

use sattrack::collectors::refresher::{load_files, RefreshSettings, Refresher};
use sattrack::collectors::tle_fetcher::http_client;
use sattrack::config::Config;
use sattrack::core::catalog::CatalogHandle;
use sattrack::tracking::scheduler::{TrackingScheduler, MAX_TIME_OFFSET_DAYS};
use sattrack::tracking::snapshot::Snapshot;
use sattrack::utils::logging;

const MAX_OFFSET_MINUTES: i64 = MAX_TIME_OFFSET_DAYS * 24 * 60;

/// Headless satellite tracker.
#[derive(Debug, Parser)]
#[command(name = "sattrack", version)]
struct Cli {
    /// YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Extra local TLE files, loaded once at startup
    #[arg(long = "tle")]
    tle: Vec<PathBuf>,
    /// Track this many minutes ahead of (or behind) the wall clock
    #[arg(
        long,
        allow_hyphen_values = true,
        value_parser = clap::value_parser!(i64).range(-MAX_OFFSET_MINUTES..=MAX_OFFSET_MINUTES)
    )]
    offset_minutes: Option<i64>,
    /// Print one JSON line per snapshot instead of log summaries
    #[arg(long)]
    json: bool,
    /// Use only the local cache and files
    #[arg(long)]
    no_network: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => match Config::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("sattrack: {}: {e}", path.display());
                return ExitCode::from(2);
            }
        },
        None => Config::default(),
    };
    logging::init(&config.logging.filter);
    info!("sattrack initialized");

    let catalog = Arc::new(CatalogHandle::new());
    let mut files = config.refresh.files.clone();
    files.extend(cli.tle.iter().cloned());
    load_files(&catalog, &files);

    let network = !cli.no_network;
    let client = if network {
        match http_client() {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(error = %e, "HTTP client unavailable; running from cache");
                None
            }
        }
    } else {
        None
    };
    let settings = RefreshSettings {
        sources: config.sources(),
        interval: config.refresh_interval(),
        cache_max_age: config.cache_max_age(),
        network,
    };
    let cache = Refresher::open_cache(&config.refresh.cache_path);
    let mut refresher = Refresher::new(Arc::clone(&catalog), settings, client, cache);
    refresher.start();

    let mut scheduler = TrackingScheduler::new(
        Arc::clone(&catalog),
        config.tick_interval(),
        config.engine_settings(),
    );
    let offset = cli
        .offset_minutes
        .map(chrono::Duration::minutes)
        .unwrap_or_else(|| config.time_offset());
    if let Err(e) = scheduler.set_time_offset(offset).and_then(|()| scheduler.start()) {
        error!(error = %e, "Failed to start tracking");
        refresher.stop().await;
        return ExitCode::FAILURE;
    }

    let mut snapshots = scheduler.subscribe();
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = Arc::clone(&snapshots.borrow_and_update());
                render(&snapshot, cli.json);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    scheduler.stop().await;
    refresher.stop().await;
    ExitCode::SUCCESS
}

fn render(snapshot: &Snapshot, as_json: bool) {
    if as_json {
        let objects: Vec<_> = snapshot
            .objects
            .values()
            .map(|o| {
                json!({
                    "id": o.id,
                    "name": o.name,
                    "state": o.state_kind,
                    "geodetic": o.geodetic,
                })
            })
            .collect();
        let line = json!({
            "tick": snapshot.tick,
            "time": snapshot.time,
            "generation": snapshot.catalog_generation,
            "objects": objects,
        });
        println!("{line}");
        return;
    }
    let counts: Vec<String> = snapshot
        .count_by_kind()
        .iter()
        .map(|(kind, n)| format!("{kind:?}={n}"))
        .collect();
    info!(
        tick = snapshot.tick,
        time = %snapshot.time.format("%Y-%m-%d %H:%M:%S"),
        generation = snapshot.catalog_generation,
        "{}",
        counts.join(" ")
    );
}
