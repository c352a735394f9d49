//! Translation of raw network notifications into typed bus events.
//!
//! The network layer reports disconnections and stream transitions through
//! synchronous [`Notifiee`] callbacks, and identification completions through
//! [`EvtPeerIdentified`](weft_primitives::EvtPeerIdentified) on the bus. The
//! [`Dispatcher`] turns both into [`EvtConnectionChanged`] and
//! [`EvtStreamChanged`], tagging each connection as client or host from the
//! peer's advertised agent version.
//!
//! Callbacks never block: they push into a bounded [`NotifyQueue`] whose
//! [`OverflowPolicy`] decides what is lost under sustained overload.
//!
//! [`EvtConnectionChanged`]: weft_primitives::EvtConnectionChanged
//! [`EvtStreamChanged`]: weft_primitives::EvtStreamChanged

mod dispatcher;
mod error;
mod metadata;
mod metrics;
mod network;
mod queue;
mod swarm;

pub use dispatcher::{DEFAULT_QUEUE_CAPACITY, DispatchConfig, Dispatcher};
pub use error::{DispatchError, DispatchResult};
pub use metadata::{DEFAULT_METADATA_PEERS, MetadataStore};
pub use network::{Network, Notifiee, PeerMetadata};
pub use queue::{NotifyHandle, NotifyQueue, OverflowPolicy, PushOutcome, RawNotification};
pub use swarm::SwarmNetwork;
