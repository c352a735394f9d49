//! Interfaces consumed from the network layer.

use std::sync::Arc;

use weft_primitives::{PeerId, StreamHandle};

use crate::NotifyHandle;

/// Synchronous callbacks invoked on the network layer's own execution context.
///
/// Implementations must return without blocking.
pub trait Notifiee: Send + Sync {
    /// A connection to `peer` closed.
    fn disconnected(&self, peer: PeerId);

    /// A stream to `peer` opened.
    fn stream_opened(&self, peer: PeerId, stream: StreamHandle);

    /// A stream to `peer` closed.
    fn stream_closed(&self, peer: PeerId, stream: StreamHandle);
}

/// Per-peer metadata recorded by the network layer.
pub trait PeerMetadata: Send + Sync {
    /// Look up `key` for `peer`. `None` when the peer or key is unknown.
    fn get(&self, peer: &PeerId, key: &str) -> Option<String>;
}

impl<T: PeerMetadata + ?Sized> PeerMetadata for Arc<T> {
    fn get(&self, peer: &PeerId, key: &str) -> Option<String> {
        (**self).get(peer, key)
    }
}

/// The network layer as seen by the dispatcher.
///
/// Identification completions are not delivered through this trait: the network
/// layer publishes [`EvtPeerIdentified`](weft_primitives::EvtPeerIdentified) on
/// the event bus.
pub trait Network: Send + Sync {
    /// Register a callback handle for disconnection and stream notifications.
    fn notify(&self, handle: NotifyHandle);

    /// Metadata store used to classify peers as clients or hosts.
    fn metadata(&self) -> Arc<dyn PeerMetadata>;
}

impl<T: Network + ?Sized> Network for Arc<T> {
    fn notify(&self, handle: NotifyHandle) {
        (**self).notify(handle)
    }

    fn metadata(&self) -> Arc<dyn PeerMetadata> {
        (**self).metadata()
    }
}
