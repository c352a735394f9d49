//! Command line interface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use libp2p::Multiaddr;
use weft_connectivity::ConnectivityConfig;
use weft_observability::LogArgs;

/// weft cluster host
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// Logging configuration (applies to all subcommands).
    #[command(flatten)]
    pub(crate) logs: LogArgs,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Start a host process.
    Start(StartArgs),
}

#[derive(Debug, Clone, Args)]
pub(crate) struct StartArgs {
    /// Cluster namespace
    #[arg(long, env = "WW_NS", default_value = "ww")]
    pub(crate) ns: String,

    /// Host listen address (defaults to /ip4/0.0.0.0/tcp/2020 and /ip6/::/tcp/2020)
    #[arg(short = 'a', long, env = "WW_LISTEN", value_delimiter = ',', value_name = "MULTIADDR")]
    pub(crate) listen: Vec<Multiaddr>,

    /// Join the cluster through a current member address
    #[arg(long, env = "WW_JOIN", value_delimiter = ',', value_name = "MULTIADDR")]
    pub(crate) join: Vec<Multiaddr>,

    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    pub(crate) config: Option<PathBuf>,

    /// Lower bound of the target neighborhood size
    #[arg(long)]
    pub(crate) kmin: Option<usize>,

    /// Upper bound of the target neighborhood size
    #[arg(long)]
    pub(crate) kmax: Option<usize>,

    /// Base period between control decisions, in seconds
    #[arg(long, value_name = "SECS")]
    pub(crate) period: Option<u64>,

    /// Jitter window around the period, in seconds
    #[arg(long, value_name = "SECS")]
    pub(crate) jitter: Option<u64>,
}

impl StartArgs {
    /// Override `config` with values given on the command line.
    pub(crate) fn apply(&self, config: &mut ConnectivityConfig) {
        if let Some(kmin) = self.kmin {
            config.kmin = kmin;
        }
        if let Some(kmax) = self.kmax {
            config.kmax = kmax;
        }
        if let Some(period) = self.period {
            config.period_secs = period;
        }
        if let Some(jitter) = self.jitter {
            config.jitter_secs = jitter;
        }
    }
}

/// Listen addresses used when neither the command line nor the config file
/// names any.
pub(crate) fn default_listen() -> Vec<Multiaddr> {
    ["/ip4/0.0.0.0/tcp/2020", "/ip6/::/tcp/2020"]
        .into_iter()
        .filter_map(|addr| addr.parse().ok())
        .collect()
}
