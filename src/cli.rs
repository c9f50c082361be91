//! Command-line interface parsing for streamcache
//!
//! This module handles parsing of CLI arguments using clap and turns them into
//! a validated `StartupConfig`. The endpoint and token may also come from the
//! environment (or a `.env` file loaded by the binary).

use clap::Parser;
use std::time::Duration;
use thiserror::Error;

use crate::manager::{ManagerConfig, DEFAULT_EXPIRY_MARGIN};
use crate::sweeper::SweepConfig;

/// Longest accepted `--ttl-secs` (one week)
pub const MAX_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Error types for CLI argument validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    /// No endpoint was given on the command line or in the environment
    #[error("No stream service endpoint. Pass --endpoint or set STREAMCACHE_ENDPOINT")]
    MissingEndpoint,

    /// The endpoint is not an http(s) URL
    #[error("Invalid endpoint: '{0}'. Expected an http:// or https:// URL")]
    InvalidEndpoint(String),

    /// A duration flag was zero
    #[error("Invalid value for --{0}: must be greater than zero")]
    ZeroDuration(&'static str),

    /// `--ttl-secs` exceeds the accepted maximum
    #[error("Invalid value for --ttl-secs: {0} exceeds the maximum of {max}", max = MAX_TTL_SECS)]
    TtlTooLarge(u64),

    /// No track ids were given
    #[error("No track ids given")]
    NoTracks,
}

/// streamcache - resolve playable stream URLs for tracks
#[derive(Parser, Debug)]
#[command(name = "streamcache")]
#[command(about = "Resolve and cache playable stream URLs for tracks")]
#[command(version)]
pub struct Cli {
    /// Track ids to resolve
    #[arg(value_name = "TRACK_ID")]
    pub track_ids: Vec<String>,

    /// GraphQL endpoint of the stream service
    #[arg(long, env = "STREAMCACHE_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Bearer token sent to the stream service
    #[arg(long, env = "STREAMCACHE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Lifetime in seconds for URLs the service returns without an expiry
    #[arg(long, value_name = "SECS", default_value_t = 300)]
    pub ttl_secs: u64,

    /// Seconds between sweeps of expired URLs
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    pub sweep_interval_secs: u64,

    /// Disable the periodic sweep
    #[arg(long)]
    pub no_sweep: bool,

    /// Log debug output to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

/// Configuration derived from CLI arguments for application startup
#[derive(Debug, Clone)]
pub struct StartupConfig {
    /// Track ids to resolve, in the order given
    pub track_ids: Vec<String>,
    /// GraphQL endpoint of the stream service
    pub endpoint: String,
    /// Optional bearer token
    pub token: Option<String>,
    /// Expiry policy for the URL manager
    pub manager: ManagerConfig,
    /// Settings for the background sweep
    pub sweep: SweepConfig,
    /// Whether debug logging was requested
    pub verbose: bool,
}

/// Validates an endpoint argument.
///
/// # Returns
/// * `Ok(String)` if the endpoint is an http(s) URL
/// * `Err(CliError::InvalidEndpoint)` otherwise
pub fn parse_endpoint_arg(s: &str) -> Result<String, CliError> {
    let trimmed = s.trim();
    let has_host = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .is_some_and(|rest| !rest.is_empty());
    if has_host {
        Ok(trimmed.to_string())
    } else {
        Err(CliError::InvalidEndpoint(s.to_string()))
    }
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with validated settings
    /// * `Err(CliError)` if a value is missing or out of range
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        if cli.track_ids.is_empty() {
            return Err(CliError::NoTracks);
        }
        let endpoint = match &cli.endpoint {
            Some(endpoint) => parse_endpoint_arg(endpoint)?,
            None => return Err(CliError::MissingEndpoint),
        };
        if cli.ttl_secs == 0 {
            return Err(CliError::ZeroDuration("ttl-secs"));
        }
        if cli.ttl_secs > MAX_TTL_SECS {
            return Err(CliError::TtlTooLarge(cli.ttl_secs));
        }
        if cli.sweep_interval_secs == 0 {
            return Err(CliError::ZeroDuration("sweep-interval-secs"));
        }

        Ok(StartupConfig {
            track_ids: cli.track_ids.clone(),
            endpoint,
            token: cli.token.clone().filter(|t| !t.is_empty()),
            manager: ManagerConfig {
                default_ttl: Duration::from_secs(cli.ttl_secs),
                expiry_margin: DEFAULT_EXPIRY_MARGIN,
            },
            sweep: SweepConfig {
                interval: Duration::from_secs(cli.sweep_interval_secs),
                enabled: !cli.no_sweep,
            },
            verbose: cli.verbose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENDPOINT: &str = "https://api.example.com/graphql";

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("streamcache").chain(args.iter().copied()))
    }

    #[test]
    fn test_parse_endpoint_arg_accepts_http_and_https() {
        assert_eq!(parse_endpoint_arg(ENDPOINT).unwrap(), ENDPOINT);
        assert_eq!(
            parse_endpoint_arg(" http://localhost:4000/graphql ").unwrap(),
            "http://localhost:4000/graphql"
        );
    }

    #[test]
    fn test_parse_endpoint_arg_invalid() {
        let result = parse_endpoint_arg("ftp://example.com");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Invalid endpoint"));
        assert!(err.to_string().contains("ftp://example.com"));

        assert!(parse_endpoint_arg("https://").is_err());
    }

    #[test]
    fn test_cli_parse_defaults() {
        let cli = parse(&["--endpoint", ENDPOINT, "t1"]);
        assert_eq!(cli.track_ids, vec!["t1"]);
        assert_eq!(cli.ttl_secs, 300);
        assert_eq!(cli.sweep_interval_secs, 60);
        assert!(!cli.no_sweep);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_startup_config_from_cli() {
        let cli = parse(&[
            "--endpoint",
            ENDPOINT,
            "--token",
            "abc",
            "--ttl-secs",
            "90",
            "--sweep-interval-secs",
            "15",
            "t1",
            "t2",
        ]);
        let config = StartupConfig::from_cli(&cli).unwrap();

        assert_eq!(config.track_ids, vec!["t1", "t2"]);
        assert_eq!(config.endpoint, ENDPOINT);
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert_eq!(config.manager.default_ttl, Duration::from_secs(90));
        assert_eq!(config.sweep.interval, Duration::from_secs(15));
        assert!(config.sweep.enabled);
    }

    #[test]
    fn test_startup_config_no_sweep() {
        let cli = parse(&["--endpoint", ENDPOINT, "--no-sweep", "t1"]);
        let config = StartupConfig::from_cli(&cli).unwrap();
        assert!(!config.sweep.enabled);
    }

    #[test]
    fn test_startup_config_empty_token_is_none() {
        let cli = parse(&["--endpoint", ENDPOINT, "--token", "", "t1"]);
        let config = StartupConfig::from_cli(&cli).unwrap();
        assert!(config.token.is_none());
    }

    #[test]
    fn test_startup_config_requires_tracks() {
        let cli = parse(&["--endpoint", ENDPOINT]);
        assert_eq!(StartupConfig::from_cli(&cli).unwrap_err(), CliError::NoTracks);
    }

    #[test]
    fn test_startup_config_rejects_zero_durations() {
        let cli = parse(&["--endpoint", ENDPOINT, "--ttl-secs", "0", "t1"]);
        assert_eq!(
            StartupConfig::from_cli(&cli).unwrap_err(),
            CliError::ZeroDuration("ttl-secs")
        );

        let cli = parse(&["--endpoint", ENDPOINT, "--sweep-interval-secs", "0", "t1"]);
        assert_eq!(
            StartupConfig::from_cli(&cli).unwrap_err(),
            CliError::ZeroDuration("sweep-interval-secs")
        );
    }

    #[test]
    fn test_startup_config_rejects_oversized_ttl() {
        let cli = parse(&["--endpoint", ENDPOINT, "--ttl-secs", "100000000000000", "t1"]);
        let err = StartupConfig::from_cli(&cli).unwrap_err();
        assert_eq!(err, CliError::TtlTooLarge(100_000_000_000_000));
        assert!(err.to_string().contains("--ttl-secs"));

        let cli = parse(&["--endpoint", ENDPOINT, "--ttl-secs", &MAX_TTL_SECS.to_string(), "t1"]);
        assert!(StartupConfig::from_cli(&cli).is_ok());
    }

    #[test]
    fn test_startup_config_invalid_endpoint() {
        let cli = parse(&["--endpoint", "not-a-url", "t1"]);
        assert!(matches!(
            StartupConfig::from_cli(&cli),
            Err(CliError::InvalidEndpoint(_))
        ));
    }
}
