//! Configuration file loading.

use std::path::Path;

use eyre::{Result, WrapErr};
use libp2p::Multiaddr;
use serde::{Deserialize, Serialize};
use weft_connectivity::ConnectivityConfig;

use crate::cli::{StartArgs, default_listen};

/// Contents of the `--config` file.
///
/// ```toml
/// [network]
/// join = ["/ip4/10.0.0.1/tcp/2020"]
///
/// [connectivity]
/// kmin = 8
/// kmax = 32
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct FileConfig {
    pub(crate) network: NetworkSection,
    pub(crate) connectivity: ConnectivityConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct NetworkSection {
    pub(crate) listen: Vec<String>,
    pub(crate) join: Vec<String>,
}

impl FileConfig {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&raw).wrap_err_with(|| format!("invalid config file {}", path.display()))
    }

    pub(crate) fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

/// Resolved settings for the `start` command.
#[derive(Debug, Clone)]
pub(crate) struct StartConfig {
    pub(crate) ns: String,
    pub(crate) listen: Vec<Multiaddr>,
    pub(crate) join: Vec<Multiaddr>,
    pub(crate) connectivity: ConnectivityConfig,
}

impl StartConfig {
    /// Merge the optional config file with command line arguments. Command
    /// line values take precedence.
    pub(crate) fn resolve(args: &StartArgs) -> Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(file, args)
    }

    fn merge(file: FileConfig, args: &StartArgs) -> Result<Self> {
        let mut connectivity = file.connectivity;
        args.apply(&mut connectivity);
        connectivity.validate()?;

        let listen = if !args.listen.is_empty() {
            args.listen.clone()
        } else if !file.network.listen.is_empty() {
            parse_addrs(&file.network.listen)?
        } else {
            default_listen()
        };

        let mut join = parse_addrs(&file.network.join)?;
        join.extend(args.join.iter().cloned());

        Ok(Self {
            ns: args.ns.clone(),
            listen,
            join,
            connectivity,
        })
    }
}

fn parse_addrs(addrs: &[String]) -> Result<Vec<Multiaddr>> {
    addrs
        .iter()
        .map(|addr| {
            addr.parse::<Multiaddr>()
                .wrap_err_with(|| format!("invalid multiaddr {addr}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn args(extra: &[&str]) -> StartArgs {
        let cli = Cli::parse_from(["weft", "start"].iter().chain(extra));
        match cli.command {
            Commands::Start(args) => args,
        }
    }

    #[test]
    fn test_parse_file() {
        let file = FileConfig::parse(
            r#"
            [network]
            join = ["/ip4/10.0.0.1/tcp/2020"]

            [connectivity]
            kmin = 4
            kmax = 12
            "#,
        )
        .unwrap();

        assert_eq!(file.network.join.len(), 1);
        assert_eq!((file.connectivity.kmin, file.connectivity.kmax), (4, 12));
        assert_eq!(file.connectivity.period_secs, 60);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(FileConfig::parse("[network]\nbogus = 1\n").is_err());
        assert!(FileConfig::parse("[connectivity]\nkmn = 3\n").is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = FileConfig::parse(
            r#"
            [network]
            listen = ["/ip4/127.0.0.1/tcp/4000"]
            join = ["/ip4/10.0.0.1/tcp/2020"]

            [connectivity]
            kmin = 4
            kmax = 12
            "#,
        )
        .unwrap();

        let config =
            StartConfig::merge(file, &args(&["--kmin", "2", "--join", "/ip4/10.0.0.2/tcp/2020"]))
                .unwrap();

        assert_eq!(config.connectivity.kmin, 2);
        assert_eq!(config.connectivity.kmax, 12);
        assert_eq!(config.listen.len(), 1);
        assert_eq!(config.join.len(), 2);
    }

    #[test]
    fn test_listen_precedence() {
        let file = FileConfig::parse("[network]\nlisten = [\"/ip4/127.0.0.1/tcp/4000\"]\n").unwrap();

        let config =
            StartConfig::merge(file.clone(), &args(&["--listen", "/ip4/127.0.0.1/tcp/5000"])).unwrap();
        assert_eq!(config.listen, vec!["/ip4/127.0.0.1/tcp/5000".parse::<Multiaddr>().unwrap()]);

        let config = StartConfig::merge(file, &args(&[])).unwrap();
        assert_eq!(config.listen, vec!["/ip4/127.0.0.1/tcp/4000".parse::<Multiaddr>().unwrap()]);

        let config = StartConfig::merge(FileConfig::default(), &args(&[])).unwrap();
        assert_eq!(config.listen, default_listen());
    }

    #[test]
    fn test_invalid_merge_rejected() {
        let file = FileConfig::parse("[connectivity]\nkmax = 4\n").unwrap();
        assert!(StartConfig::merge(file, &args(&["--kmin", "5"])).is_err());

        let file = FileConfig::parse("[network]\njoin = [\"not an addr\"]\n").unwrap();
        assert!(StartConfig::merge(file, &args(&[])).is_err());
    }
}
