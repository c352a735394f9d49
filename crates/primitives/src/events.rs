//! Typed events carried over the event bus.

use core::time::Duration;

use libp2p::PeerId;

use crate::Phase;

/// State transition of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConnState {
    Opened,
    Closed,
}

/// State transition of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum StreamState {
    Opened,
    Closed,
}

/// Opaque handle identifying a stream within the network layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamHandle(u64);

impl StreamHandle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

/// A physical connection to `peer` was opened or closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvtConnectionChanged {
    pub peer: PeerId,
    /// True when the remote is a client process rather than a host.
    pub client: bool,
    pub state: ConnState,
}

/// A stream to `peer` was opened or closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvtStreamChanged {
    pub peer: PeerId,
    pub stream: StreamHandle,
    pub state: StreamState,
}

/// The network layer completed identification of `peer` on a new connection.
///
/// Peer metadata is guaranteed to be available once this event is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvtPeerIdentified {
    pub peer: PeerId,
}

/// A peer joined (lease) or left (eviction) the neighborhood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvtNeighborhoodChanged {
    /// Peer whose lease or eviction triggered the event.
    pub peer: PeerId,
    pub state: ConnState,
    /// Phase reported by the previous event.
    pub from: Phase,
    /// Phase after this transition.
    pub to: Phase,
    /// Number of distinct host peers after this transition.
    pub count: usize,
}

impl EvtNeighborhoodChanged {
    /// Whether the phase value itself changed.
    pub fn is_transition(&self) -> bool {
        self.from != self.to
    }
}

/// Wall-clock progress since the previous timestep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvtTimestep {
    pub delta: Duration,
}

/// Payload-free request for a higher-level connectivity action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ControlRequest {
    /// The node is orphaned; perform out-of-band peer discovery.
    Boot,
    /// The node is below `kmin`; query the peer graph for more neighbors.
    Graft,
    /// The node is at or above `kmax`; shed connections.
    Prune,
}

impl ControlRequest {
    /// The request issued for a node observed in `phase`, if any.
    pub const fn for_phase(phase: Phase) -> Option<Self> {
        match phase {
            Phase::Orphaned => Some(Self::Boot),
            Phase::Partial => Some(Self::Graft),
            Phase::Complete => None,
            Phase::Overloaded => Some(Self::Prune),
        }
    }
}
