//! Core primitive types for weft connectivity management.
//!
//! # Types
//!
//! ## Phases
//! - [`Phase`] - Classification of the neighborhood size against `kmin`/`kmax`
//!
//! ## Bus Events
//! - [`EvtConnectionChanged`], [`EvtStreamChanged`] - Translated network notifications
//! - [`EvtPeerIdentified`] - Published by the network layer once identification completes
//! - [`EvtNeighborhoodChanged`] - Published by the neighborhood tracker on lease/eviction
//! - [`EvtTimestep`] - Periodic clock signal driving the graph scheduler
//! - [`ControlRequest`] - Rate-limited boot/graft/prune signal
//!
//! ## Address Types
//! - [`PeerId`] - libp2p peer identifier

mod events;
mod phase;

pub use events::{
    ConnState, ControlRequest, EvtConnectionChanged, EvtNeighborhoodChanged, EvtPeerIdentified,
    EvtStreamChanged, EvtTimestep, StreamHandle, StreamState,
};
pub use phase::Phase;

// Re-export libp2p PeerId as the opaque peer identifier.
pub use libp2p::PeerId;

/// Peer metadata key under which the remote agent version is stored.
pub const AGENT_VERSION_KEY: &str = "AgentVersion";

/// Agent version advertised by client (non-host) processes.
///
/// Connections from peers advertising this agent are excluded from neighborhood
/// accounting.
pub const CLIENT_AGENT_VERSION: &str = "weft/client";

/// Agent version advertised by host processes.
pub const HOST_AGENT_VERSION: &str = "weft/host";
