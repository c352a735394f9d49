//! Jittered deadline scheduler driven by explicit time deltas.

use std::time::Duration;

use rand::{Rng, SeedableRng, rngs::StdRng};
use weft_primitives::PeerId;

/// Accumulates elapsed time and fires once a jittered deadline is reached.
///
/// Deadlines are drawn uniformly from `[base - jitter, base + jitter]`, the
/// lower bound saturating at zero. The scheduler does not read a clock: callers
/// feed it deltas, which keeps it deterministic under test.
#[derive(Debug, Clone)]
pub struct Scheduler {
    base: Duration,
    jitter: Duration,
    rng: StdRng,
    elapsed: Duration,
    deadline: Duration,
}

impl Scheduler {
    pub fn new(base: Duration, jitter: Duration, seed: u64) -> Self {
        let mut scheduler = Self {
            base,
            jitter,
            rng: StdRng::seed_from_u64(seed),
            elapsed: Duration::ZERO,
            deadline: base,
        };
        scheduler.deadline = scheduler.draw();
        scheduler
    }

    /// Derive a seed from a peer identity.
    ///
    /// Nodes sharing the same period draw different deadlines, while a given
    /// node draws the same sequence across restarts.
    pub fn seed_from_peer(peer: &PeerId) -> u64 {
        // FNV-1a over the multihash bytes.
        peer.to_bytes()
            .iter()
            .fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
                (hash ^ u64::from(*byte)).wrapping_mul(0x0100_0000_01b3)
            })
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn jitter(&self) -> Duration {
        self.jitter
    }

    /// The current jittered deadline.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Add `delta` to the elapsed time. Returns `true` once the deadline is reached.
    ///
    /// The scheduler stays expired until [`reset`](Self::reset) is called.
    pub fn advance(&mut self, delta: Duration) -> bool {
        self.elapsed = self.elapsed.saturating_add(delta);
        self.elapsed >= self.deadline
    }

    /// Draw a new deadline, carrying any time elapsed past the previous one.
    ///
    /// Overshoot that alone reaches the new deadline is dropped, so a stalled
    /// caller fires once instead of in a burst.
    pub fn reset(&mut self) {
        let overshoot = self.elapsed.saturating_sub(self.deadline);
        self.deadline = self.draw();
        self.elapsed = if overshoot < self.deadline {
            overshoot
        } else {
            Duration::ZERO
        };
    }

    fn draw(&mut self) -> Duration {
        let lo = nanos(self.base.saturating_sub(self.jitter));
        let hi = nanos(self.base.saturating_add(self.jitter));
        if lo >= hi {
            return Duration::from_nanos(lo);
        }
        Duration::from_nanos(self.rng.random_range(lo..=hi))
    }
}

fn nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BASE: Duration = Duration::from_secs(60);
    const JITTER: Duration = Duration::from_secs(15);

    #[test]
    fn test_fires_at_deadline() {
        let mut s = Scheduler::new(Duration::from_secs(10), Duration::ZERO, 1);
        assert_eq!(s.deadline(), Duration::from_secs(10));

        for _ in 0..9 {
            assert!(!s.advance(Duration::from_secs(1)));
        }
        assert_eq!(s.deadline() - s.elapsed(), Duration::from_secs(1));
        assert!(s.advance(Duration::from_secs(1)));
        assert_eq!(s.elapsed(), s.deadline());

        // Stays expired until reset.
        assert!(s.advance(Duration::ZERO));
        s.reset();
        assert_eq!(s.elapsed(), Duration::ZERO);
        assert!(!s.advance(Duration::from_secs(1)));
    }

    #[test]
    fn test_same_seed_same_deadlines() {
        let mut a = Scheduler::new(BASE, JITTER, 42);
        let mut b = Scheduler::new(BASE, JITTER, 42);

        for _ in 0..32 {
            assert_eq!(a.deadline(), b.deadline());
            a.reset();
            b.reset();
        }
    }

    #[test]
    fn test_peers_decorrelate() {
        let seeds: Vec<_> = (0..16)
            .map(|_| Scheduler::seed_from_peer(&PeerId::random()))
            .collect();
        let deadlines: std::collections::HashSet<_> = seeds
            .iter()
            .map(|seed| Scheduler::new(BASE, JITTER, *seed).deadline())
            .collect();

        assert!(deadlines.len() > 1);
    }

    #[test]
    fn test_seed_from_peer_is_stable() {
        let peer = PeerId::random();
        assert_eq!(Scheduler::seed_from_peer(&peer), Scheduler::seed_from_peer(&peer));
    }

    #[test]
    fn test_jitter_larger_than_base_saturates() {
        let mut s = Scheduler::new(Duration::from_secs(1), Duration::from_secs(5), 7);
        for _ in 0..64 {
            assert!(s.deadline() <= Duration::from_secs(6));
            s.reset();
        }
    }

    #[test]
    fn test_firing_intervals_within_jitter_window() {
        let tick = Duration::from_millis(100);
        let mut s = Scheduler::new(BASE, JITTER, 3);
        let mut since_last = Duration::ZERO;
        let mut firings = 0;

        while firings < 50 {
            since_last += tick;
            if s.advance(tick) {
                assert!(since_last + tick > BASE - JITTER, "{since_last:?} below window");
                assert!(since_last < BASE + JITTER + tick, "{since_last:?} above window");
                s.reset();
                since_last = Duration::ZERO;
                firings += 1;
            }
        }
    }

    #[test]
    fn test_overshoot_carries_into_next_deadline() {
        let mut s = Scheduler::new(Duration::from_secs(10), Duration::ZERO, 1);

        // 4 steps of 3s reach 12s: 2s past the deadline.
        let steps = (1..=4).filter(|_| s.advance(Duration::from_secs(3))).count();
        assert_eq!(steps, 1);
        s.reset();
        assert_eq!(s.elapsed(), Duration::from_secs(2));

        // The next firing comes 8s later rather than 10s.
        assert!(!s.advance(Duration::from_secs(7)));
        assert!(s.advance(Duration::from_secs(1)));
    }

    #[test]
    fn test_overshoot_beyond_deadline_is_dropped() {
        let mut s = Scheduler::new(Duration::from_secs(10), Duration::ZERO, 1);

        assert!(s.advance(Duration::from_secs(45)));
        s.reset();
        assert_eq!(s.elapsed(), Duration::ZERO);
        assert!(!s.advance(Duration::from_secs(9)));
    }

    #[test]
    fn test_mean_interval_matches_base() {
        let tick = Duration::from_millis(700);
        let mut s = Scheduler::new(Duration::from_secs(10), Duration::ZERO, 1);
        let mut total = Duration::ZERO;
        let mut firings = 0u32;

        while firings < 100 {
            total += tick;
            if s.advance(tick) {
                s.reset();
                firings += 1;
            }
        }

        // Without carry-over every interval would round up to 10.5s.
        let mean = total / firings;
        assert!(mean < Duration::from_millis(10_100), "{mean:?}");
    }

    proptest! {
        #[test]
        fn proptest_deadline_in_window(seed: u64, resets in 0..64usize) {
            let mut s = Scheduler::new(BASE, JITTER, seed);
            for _ in 0..resets {
                s.reset();
            }
            prop_assert!(s.deadline() >= BASE - JITTER);
            prop_assert!(s.deadline() <= BASE + JITTER);
        }
    }
}
