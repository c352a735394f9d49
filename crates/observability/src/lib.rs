//! Logging setup for weft binaries.

use clap::{Args, ValueEnum};
use eyre::{Result, eyre};
use tracing::warn;
use tracing_subscriber::{EnvFilter, filter::Directive};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Logging configuration
#[derive(Debug, Args, Clone, Default)]
pub struct LogArgs {
    /// Silence all output except errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Verbose mode (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Include timestamps in text logs
    #[arg(long)]
    pub timestamps: bool,

    /// Extra filter directives, comma separated
    #[arg(long = "log.filter", value_name = "DIRECTIVE")]
    pub filter: Option<String>,

    /// Log output format
    #[arg(long = "log.format", value_enum, default_value_t = LogFormat::Text)]
    pub format: LogFormat,
}

/// Build the event filter for `args`.
///
/// Precedence:
/// 1. `--quiet` shows errors only
/// 2. otherwise `RUST_LOG` if set, or a level derived from `-v` flags
/// 3. `--log.filter` directives are added on top
///
/// Returns the filter and any directives that failed to parse.
pub fn build_filter(args: &LogArgs) -> (EnvFilter, Vec<String>) {
    if args.quiet {
        return (EnvFilter::new("error"), Vec::new());
    }

    let level = match args.verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let mut invalid = Vec::new();
    let directives = args.filter.iter().flat_map(|f| f.split(','));
    for directive in directives.map(str::trim).filter(|d| !d.is_empty()) {
        match directive.parse::<Directive>() {
            Ok(d) => filter = filter.add_directive(d),
            Err(_) => invalid.push(directive.to_owned()),
        }
    }

    (filter, invalid)
}

/// Install the global subscriber.
pub fn init_logging(args: &LogArgs) -> Result<()> {
    let (filter, invalid) = build_filter(args);

    let installed = match (args.format, args.timestamps) {
        (LogFormat::Json, _) => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
        (LogFormat::Text, true) => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
        (LogFormat::Text, false) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .without_time()
            .try_init(),
    };
    installed.map_err(|e| eyre!("failed to install log subscriber: {e}"))?;

    for directive in invalid {
        warn!(%directive, "Ignoring invalid log filter directive");
    }

    Ok(())
}
