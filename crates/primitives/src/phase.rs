//! Connectivity phases.

use serde::{Deserialize, Serialize};

/// Connectivity phase of the local node, ordered by neighborhood size.
///
/// The phase is a pure function of the number of connected host peers `k`
/// and the configured bounds `kmin <= kmax`:
///
/// | `k`                | phase        |
/// |--------------------|--------------|
/// | `0`                | `Orphaned`   |
/// | `0 < k < kmin`     | `Partial`    |
/// | `kmin <= k < kmax` | `Complete`   |
/// | `k >= kmax`        | `Overloaded` |
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    /// No host peers are connected.
    #[default]
    Orphaned,
    /// Fewer than `kmin` host peers are connected.
    Partial,
    /// Between `kmin` (inclusive) and `kmax` (exclusive) host peers are connected.
    Complete,
    /// At least `kmax` host peers are connected.
    Overloaded,
}

impl Phase {
    /// Classify a neighborhood of `k` peers against the bounds `kmin` and `kmax`.
    ///
    /// Zero is checked first, so an empty neighborhood is always `Orphaned`
    /// regardless of the bounds.
    pub const fn classify(k: usize, kmin: usize, kmax: usize) -> Self {
        if k == 0 {
            Self::Orphaned
        } else if k < kmin {
            Self::Partial
        } else if k < kmax {
            Self::Complete
        } else {
            Self::Overloaded
        }
    }
}
