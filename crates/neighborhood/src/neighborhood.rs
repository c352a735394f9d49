//! Reference-counted set of connected host peers.

use std::collections::{HashMap, hash_map::Entry};

use serde::{Deserialize, Serialize};
use weft_primitives::{PeerId, Phase};

use crate::{NeighborhoodError, NeighborhoodResult};

/// Default lower bound of the target neighborhood size.
pub const DEFAULT_KMIN: usize = 8;

/// Default upper bound of the target neighborhood size.
pub const DEFAULT_KMAX: usize = 32;

/// Target neighborhood size bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborhoodConfig {
    pub kmin: usize,
    pub kmax: usize,
}

impl Default for NeighborhoodConfig {
    fn default() -> Self {
        Self {
            kmin: DEFAULT_KMIN,
            kmax: DEFAULT_KMAX,
        }
    }
}

impl NeighborhoodConfig {
    pub fn new(kmin: usize, kmax: usize) -> NeighborhoodResult<Self> {
        let config = Self { kmin, kmax };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> NeighborhoodResult<()> {
        if self.kmin > self.kmax {
            return Err(NeighborhoodError::InvalidBounds {
                kmin: self.kmin,
                kmax: self.kmax,
            });
        }
        Ok(())
    }
}

/// Distinct host peers with at least one open connection.
///
/// Each peer carries a count of outstanding connections. A peer joins on its
/// first connection (lease) and leaves when its count returns to zero (eviction).
#[derive(Debug, Clone, Default)]
pub struct Neighborhood {
    config: NeighborhoodConfig,
    peers: HashMap<PeerId, usize>,
}

impl Neighborhood {
    pub fn new(config: NeighborhoodConfig) -> Self {
        Self {
            config,
            peers: HashMap::new(),
        }
    }

    pub fn config(&self) -> NeighborhoodConfig {
        self.config
    }

    /// Record a connection to `peer`. Returns `true` on lease.
    pub fn add(&mut self, peer: PeerId) -> bool {
        let count = self.peers.entry(peer).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Release a connection to `peer`. Returns `true` on eviction.
    pub fn remove(&mut self, peer: &PeerId) -> NeighborhoodResult<bool> {
        match self.peers.entry(*peer) {
            Entry::Vacant(_) => Err(NeighborhoodError::UnpairedClose { peer: *peer }),
            Entry::Occupied(mut entry) => {
                let count = entry.get_mut();
                *count = count.saturating_sub(1);
                if *count == 0 {
                    entry.remove();
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    /// Number of distinct connected peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Outstanding connections to `peer`.
    pub fn connections(&self, peer: &PeerId) -> usize {
        self.peers.get(peer).copied().unwrap_or(0)
    }

    pub fn phase(&self) -> Phase {
        Phase::classify(self.len(), self.config.kmin, self.config.kmax)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    fn neighborhood(kmin: usize, kmax: usize) -> Neighborhood {
        Neighborhood::new(NeighborhoodConfig::new(kmin, kmax).unwrap())
    }

    #[test]
    fn test_config_validation() {
        assert!(NeighborhoodConfig::default().validate().is_ok());
        assert!(NeighborhoodConfig::new(0, 0).is_ok());
        assert!(NeighborhoodConfig::new(4, 4).is_ok());
        assert_matches!(
            NeighborhoodConfig::new(5, 4),
            Err(NeighborhoodError::InvalidBounds { kmin: 5, kmax: 4 })
        );
    }

    #[test]
    fn test_lease_and_eviction() {
        let mut n = neighborhood(3, 6);
        let peer = PeerId::random();

        assert!(n.add(peer));
        assert_eq!(n.len(), 1);
        assert_eq!(n.phase(), Phase::Partial);

        assert!(n.remove(&peer).unwrap());
        assert!(n.is_empty());
        assert_eq!(n.phase(), Phase::Orphaned);
    }

    #[test]
    fn test_multiple_connections_decrement() {
        let mut n = neighborhood(3, 6);
        let peer = PeerId::random();

        assert!(n.add(peer));
        assert!(!n.add(peer));
        assert!(!n.add(peer));
        assert_eq!(n.connections(&peer), 3);
        assert_eq!(n.len(), 1);

        assert!(!n.remove(&peer).unwrap());
        assert!(!n.remove(&peer).unwrap());
        assert_eq!(n.connections(&peer), 1);

        assert!(n.remove(&peer).unwrap());
        assert_eq!(n.connections(&peer), 0);
        assert!(n.is_empty());
    }

    #[test]
    fn test_unpaired_close() {
        let mut n = neighborhood(3, 6);
        let peer = PeerId::random();

        assert_matches!(
            n.remove(&peer),
            Err(NeighborhoodError::UnpairedClose { peer: p }) if p == peer
        );

        n.add(peer);
        n.remove(&peer).unwrap();
        assert_matches!(n.remove(&peer), Err(NeighborhoodError::UnpairedClose { .. }));
    }

    #[test]
    fn test_phase_walk() {
        let mut n = neighborhood(3, 6);
        let peers: Vec<_> = (0..7).map(|_| PeerId::random()).collect();
        let expected = [
            Phase::Partial,
            Phase::Partial,
            Phase::Complete,
            Phase::Complete,
            Phase::Complete,
            Phase::Overloaded,
            Phase::Overloaded,
        ];

        for (peer, phase) in peers.iter().zip(expected) {
            n.add(*peer);
            assert_eq!(n.phase(), phase);
        }
    }

    #[derive(Debug, Clone)]
    enum Op {
        Open(usize),
        Close(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![(0..8usize).prop_map(Op::Open), (0..8usize).prop_map(Op::Close)]
    }

    proptest! {
        #[test]
        fn proptest_count_matches_outstanding(ops in prop::collection::vec(op(), 0..200)) {
            let peers: Vec<_> = (0..8).map(|_| PeerId::random()).collect();
            let mut n = neighborhood(2, 5);
            let mut outstanding = vec![0usize; peers.len()];

            for op in ops {
                match op {
                    Op::Open(i) => {
                        let lease = n.add(peers[i]);
                        prop_assert_eq!(lease, outstanding[i] == 0);
                        outstanding[i] += 1;
                    }
                    Op::Close(i) => {
                        let result = n.remove(&peers[i]);
                        if outstanding[i] == 0 {
                            prop_assert!(result.is_err());
                        } else {
                            outstanding[i] -= 1;
                            prop_assert_eq!(result.unwrap(), outstanding[i] == 0);
                        }
                    }
                }

                let live = outstanding.iter().filter(|c| **c > 0).count();
                prop_assert_eq!(n.len(), live);
                prop_assert_eq!(n.phase(), Phase::classify(live, 2, 5));
            }
        }

        #[test]
        fn proptest_repeated_open_is_idempotent(repeats in 1..20usize) {
            let mut n = neighborhood(2, 5);
            let peer = PeerId::random();
            n.add(peer);

            for _ in 0..repeats {
                prop_assert!(!n.add(peer));
            }

            prop_assert_eq!(n.len(), 1);
            prop_assert_eq!(n.connections(&peer), repeats + 1);
            prop_assert_eq!(n.phase(), Phase::Partial);
        }
    }
}
