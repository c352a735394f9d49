//! Connectivity configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use weft_bus::EventBus;
use weft_graph::GraphConfig;
use weft_net_dispatch::{DispatchConfig, OverflowPolicy};
use weft_neighborhood::NeighborhoodConfig;
use weft_primitives::PeerId;

/// Invalid connectivity configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("kmin ({kmin}) must not exceed kmax ({kmax})")]
    InvalidBounds { kmin: usize, kmax: usize },
    #[error("jitter ({jitter_secs}s) must not exceed period ({period_secs}s)")]
    JitterExceedsPeriod { period_secs: u64, jitter_secs: u64 },
    #[error("{0} must be non-zero")]
    Zero(&'static str),
}

/// Connectivity settings, loadable from the `[connectivity]` table of a TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectivityConfig {
    /// Lower bound of the target neighborhood size.
    pub kmin: usize,
    /// Upper bound of the target neighborhood size.
    pub kmax: usize,
    /// Base period between control decisions, in seconds.
    pub period_secs: u64,
    /// Jitter window around the period, in seconds.
    pub jitter_secs: u64,
    /// Timestep interval, in milliseconds.
    pub tick_ms: u64,
    /// Capacity of the network notification queue.
    pub queue_capacity: usize,
    pub overflow: OverflowPolicy,
    /// Per-subscription capacity of the event bus.
    pub bus_capacity: usize,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            kmin: weft_neighborhood::DEFAULT_KMIN,
            kmax: weft_neighborhood::DEFAULT_KMAX,
            period_secs: weft_graph::DEFAULT_PERIOD.as_secs(),
            jitter_secs: weft_graph::DEFAULT_JITTER.as_secs(),
            tick_ms: weft_graph::DEFAULT_TICK.as_millis() as u64,
            queue_capacity: weft_net_dispatch::DEFAULT_QUEUE_CAPACITY,
            overflow: OverflowPolicy::default(),
            bus_capacity: weft_bus::DEFAULT_CAPACITY,
        }
    }
}

impl ConnectivityConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kmin > self.kmax {
            return Err(ConfigError::InvalidBounds {
                kmin: self.kmin,
                kmax: self.kmax,
            });
        }
        if self.period_secs == 0 {
            return Err(ConfigError::Zero("period"));
        }
        if self.jitter_secs > self.period_secs {
            return Err(ConfigError::JitterExceedsPeriod {
                period_secs: self.period_secs,
                jitter_secs: self.jitter_secs,
            });
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::Zero("tick"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Zero("queue capacity"));
        }
        if self.bus_capacity == 0 {
            return Err(ConfigError::Zero("bus capacity"));
        }
        Ok(())
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_secs(self.jitter_secs)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// A fresh event bus with the configured capacity.
    pub fn bus(&self) -> EventBus {
        EventBus::new(self.bus_capacity)
    }

    pub fn neighborhood(&self) -> NeighborhoodConfig {
        NeighborhoodConfig {
            kmin: self.kmin,
            kmax: self.kmax,
        }
    }

    /// Scheduler settings seeded from `local_peer`.
    pub fn graph(&self, local_peer: &PeerId) -> GraphConfig {
        GraphConfig::for_peer(self.period(), self.jitter(), local_peer)
    }

    pub fn dispatch(&self) -> DispatchConfig {
        DispatchConfig {
            queue_capacity: self.queue_capacity,
            overflow: self.overflow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_defaults() {
        let config = ConnectivityConfig::default();
        assert_eq!((config.kmin, config.kmax), (8, 32));
        assert_eq!(config.period(), Duration::from_secs(60));
        assert_eq!(config.jitter(), Duration::from_secs(15));
        assert_eq!(config.tick(), Duration::from_secs(1));
        assert_eq!(config.queue_capacity, 1024);
        assert_eq!(config.overflow, OverflowPolicy::DropOldest);
        assert_eq!(config.bus_capacity, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ConnectivityConfig = toml::from_str(
            r#"
            kmin = 3
            kmax = 6
            overflow = "drop-newest"
            "#,
        )
        .unwrap();

        assert_eq!((config.kmin, config.kmax), (3, 6));
        assert_eq!(config.overflow, OverflowPolicy::DropNewest);
        assert_eq!(config.period_secs, 60);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = toml::from_str::<ConnectivityConfig>("kmn = 3\n").unwrap_err();
        assert!(err.to_string().contains("kmn"), "{err}");
    }

    #[test]
    fn test_validation() {
        let invalid = |f: fn(&mut ConnectivityConfig)| {
            let mut config = ConnectivityConfig::default();
            f(&mut config);
            config.validate()
        };

        assert_matches!(
            invalid(|c| c.kmin = 40),
            Err(ConfigError::InvalidBounds { kmin: 40, kmax: 32 })
        );
        assert_matches!(
            invalid(|c| c.jitter_secs = 61),
            Err(ConfigError::JitterExceedsPeriod { .. })
        );
        assert_matches!(invalid(|c| c.period_secs = 0), Err(ConfigError::Zero("period")));
        assert_matches!(invalid(|c| c.tick_ms = 0), Err(ConfigError::Zero("tick")));
        assert_matches!(invalid(|c| c.queue_capacity = 0), Err(ConfigError::Zero(_)));
        assert_matches!(invalid(|c| c.bus_capacity = 0), Err(ConfigError::Zero(_)));

        // Equal bounds and zero jitter are allowed.
        assert!(invalid(|c| c.kmin = c.kmax).is_ok());
        assert!(invalid(|c| c.jitter_secs = 0).is_ok());
    }

    #[test]
    fn test_component_configs() {
        let config = ConnectivityConfig {
            kmin: 2,
            kmax: 4,
            ..Default::default()
        };
        let peer = PeerId::random();

        assert_eq!(config.neighborhood(), NeighborhoodConfig { kmin: 2, kmax: 4 });
        assert_eq!(config.graph(&peer).seed, weft_graph::Scheduler::seed_from_peer(&peer));
        assert_eq!(config.dispatch().queue_capacity, 1024);
        assert_eq!(config.bus().capacity(), 256);
    }
}
