#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Isochrone cache warming and inspection.
//!
//! ```text
//! fusion_map warm --cache isochrone_cache.json --origins facilities.csv [--mode car] [--concurrency 4]
//! fusion_map stats --cache isochrone_cache.json
//! ```
//!
//! `warm` needs the routing provider key in the environment
//! (`ORS_API_KEY`). Logging is controlled by `RUST_LOG`.

mod origins;
mod stats;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fusion_map_isochrone::cache::{DEFAULT_CACHE_FILE, DEFAULT_MAX_CONCURRENT_REQUESTS};
use fusion_map_isochrone::{CacheConfig, IsochroneCache, JsonFileStore, create_provider_from_env};
use fusion_map_isochrone_models::TravelMode;

#[derive(Parser)]
#[command(name = "fusion_map", about = "Warm and inspect the isochrone cache")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every missing isochrone for a list of origins
    Warm {
        /// Cache snapshot file
        #[arg(long, default_value = DEFAULT_CACHE_FILE)]
        cache: PathBuf,
        /// CSV file with `lat,lng[,title]` columns
        #[arg(long)]
        origins: PathBuf,
        /// Travel mode (repeatable, defaults to every mode)
        #[arg(long = "mode")]
        modes: Vec<TravelMode>,
        /// Maximum concurrent provider requests
        #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENT_REQUESTS)]
        concurrency: usize,
    },
    /// Print entry counts per mode and duration
    Stats {
        /// Cache snapshot file
        #[arg(long, default_value = DEFAULT_CACHE_FILE)]
        cache: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    match cli.command {
        Commands::Warm {
            cache,
            origins,
            modes,
            concurrency,
        } => warm(cache, &origins, &modes, concurrency).await,
        Commands::Stats { cache } => {
            let loaded = JsonFileStore::new(&cache).load()?;
            if !loaded.report.file_found {
                println!("No cache file at {}", cache.display());
                return Ok(());
            }
            if !loaded.report.dropped.is_empty() {
                println!("{} invalid entries ignored", loaded.report.dropped.len());
            }
            print!("{}", stats::CacheStats::from_keys(loaded.entries.keys()).render());
            Ok(())
        }
    }
}

async fn warm(
    path: PathBuf,
    origins_path: &std::path::Path,
    modes: &[TravelMode],
    concurrency: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let modes = if modes.is_empty() {
        TravelMode::all()
    } else {
        modes
    };

    let origins = origins::read_origins_from_path(origins_path)?;
    let keys = origins::keys_for(&origins, modes);
    log::info!(
        "Warming {} isochrones for {} origins ({:?})",
        keys.len(),
        origins.len(),
        modes
    );

    let provider = create_provider_from_env()?;
    let config = CacheConfig {
        path,
        max_concurrent_requests: concurrency,
    };
    let (cache, report) = IsochroneCache::open(&config, provider)?;
    log::info!(
        "Loaded {} cached isochrones ({} legacy, {} dropped)",
        report.loaded,
        report.legacy_imported,
        report.dropped.len()
    );

    let results = cache.get_batch(&keys).await;
    let mut failed = 0usize;
    for (key, result) in &results {
        if let Err(e) = result {
            failed += 1;
            log::warn!("{key}: {}", e.cause);
        }
    }

    let summary = cache.persist()?;
    println!(
        "{} isochrones resolved, {failed} unavailable; cache holds {} entries ({} new, written: {})",
        results.len() - failed,
        cache.len(),
        summary.new_entries,
        summary.written
    );

    Ok(())
}
