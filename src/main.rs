//! streamcache - resolve playable stream URLs for tracks
//!
//! Resolves each track id given on the command line through the stream
//! service, caching URLs until they expire, and prints one
//! `<track id>\t<url>` line per resolved track.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use streamcache::cli::{Cli, StartupConfig};
use streamcache::logging::init_logging;
use streamcache::{GraphqlResolver, StreamUrlCache, StreamUrlManager, SweepHandle};

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let config = match StartupConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return Ok(ExitCode::from(2));
        }
    };

    init_logging(config.verbose)?;

    let mut resolver = GraphqlResolver::new(config.endpoint.clone());
    if let Some(token) = &config.token {
        resolver = resolver.with_token(token.clone());
    }

    let cache = StreamUrlCache::new().into_shared();
    let manager = StreamUrlManager::new(cache.clone(), Arc::new(resolver), config.manager.clone());
    let sweeper = SweepHandle::spawn(cache, config.sweep.clone());

    info!(
        tracks = config.track_ids.len(),
        endpoint = config.endpoint.as_str(),
        "resolving stream urls"
    );

    let results = manager.playable_urls(&config.track_ids).await;

    let mut failures = 0usize;
    for (track_id, result) in config.track_ids.iter().zip(results) {
        match result {
            Ok(url) => println!("{}\t{}", track_id, url),
            Err(e) => {
                failures += 1;
                error!(track_id = track_id.as_str(), error = %e, "could not resolve stream url");
                eprintln!("{}: {}", track_id, e);
            }
        }
    }

    sweeper.shutdown().await;

    if failures > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
