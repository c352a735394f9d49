//! [`Network`] implementation fed by a libp2p swarm.
//!
//! The swarm loop forwards identify and connection events here. Only
//! connections that completed identification produce a disconnection
//! notification, so every `Closed` the dispatcher emits has a matching `Opened`.
//! Only connection lifecycle is reported; stream notifications are left to
//! [`Network`] implementations that run stream protocols.

use std::{collections::HashMap, sync::Arc};

use libp2p::{identify, swarm::ConnectionId, swarm::SwarmEvent};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};
use weft_bus::{BusResult, Emitter, EventBus};
use weft_primitives::{AGENT_VERSION_KEY, EvtPeerIdentified, PeerId};

use crate::{MetadataStore, Network, Notifiee, NotifyHandle, PeerMetadata};

/// Network adapter between a libp2p swarm and the dispatcher.
pub struct SwarmNetwork {
    handles: RwLock<Vec<NotifyHandle>>,
    metadata: Arc<MetadataStore>,
    identified: Emitter<EvtPeerIdentified>,
    /// Identified connections and their remote peer.
    connections: Mutex<HashMap<ConnectionId, PeerId>>,
}

impl core::fmt::Debug for SwarmNetwork {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SwarmNetwork")
            .field("handles", &self.handles.read().len())
            .field("connections", &self.connections.lock().len())
            .finish_non_exhaustive()
    }
}

impl SwarmNetwork {
    pub fn new(bus: &EventBus) -> BusResult<Self> {
        Self::with_metadata(bus, Arc::new(MetadataStore::default()))
    }

    pub fn with_metadata(bus: &EventBus, metadata: Arc<MetadataStore>) -> BusResult<Self> {
        Ok(Self {
            handles: RwLock::new(Vec::new()),
            metadata,
            identified: bus.emitter()?,
            connections: Mutex::new(HashMap::new()),
        })
    }

    /// Number of connections that completed identification and are still open.
    pub fn identified_connections(&self) -> usize {
        self.connections.lock().len()
    }

    /// Record the agent version of `peer` and publish [`EvtPeerIdentified`]
    /// the first time `connection` is identified.
    ///
    /// The metadata of `peer` is held until every identified connection to it
    /// has closed.
    ///
    /// Returns whether an event was published.
    pub async fn connection_identified(
        &self,
        peer: PeerId,
        connection: ConnectionId,
        agent_version: &str,
    ) -> BusResult<bool> {
        // Periodic re-identification of the same connection is not a new lease.
        if self.connections.lock().insert(connection, peer).is_some() {
            self.metadata.set(peer, AGENT_VERSION_KEY, agent_version);
            trace!(%peer, ?connection, "Connection re-identified");
            return Ok(false);
        }

        self.metadata.pin(peer);
        self.metadata.set(peer, AGENT_VERSION_KEY, agent_version);

        debug!(%peer, ?connection, agent_version, "Connection identified");
        self.identified.emit(EvtPeerIdentified { peer }).await?;
        Ok(true)
    }

    /// Notify registered handles that an identified `connection` closed.
    ///
    /// Returns whether the connection had been identified.
    pub fn connection_closed(&self, peer: PeerId, connection: ConnectionId) -> bool {
        if self.connections.lock().remove(&connection).is_none() {
            trace!(%peer, ?connection, "Unidentified connection closed");
            return false;
        }

        debug!(%peer, ?connection, "Identified connection closed");
        self.metadata.unpin(&peer);
        for handle in self.handles.read().iter() {
            handle.disconnected(peer);
        }
        true
    }

    /// Handle an identify behaviour event.
    pub async fn on_identify_event(&self, event: &identify::Event) -> BusResult<()> {
        if let identify::Event::Received {
            connection_id,
            peer_id,
            info,
        } = event
        {
            self.connection_identified(*peer_id, *connection_id, &info.agent_version)
                .await?;
        }
        Ok(())
    }

    /// Handle the connection lifecycle part of a swarm event.
    pub fn on_swarm_event<T>(&self, event: &SwarmEvent<T>) {
        if let SwarmEvent::ConnectionClosed {
            peer_id,
            connection_id,
            ..
        } = event
        {
            self.connection_closed(*peer_id, *connection_id);
        }
    }
}

impl Network for SwarmNetwork {
    fn notify(&self, handle: NotifyHandle) {
        self.handles.write().push(handle);
    }

    fn metadata(&self) -> Arc<dyn PeerMetadata> {
        self.metadata.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DispatchConfig, Dispatcher};
    use std::time::Duration;
    use weft_primitives::{
        CLIENT_AGENT_VERSION, ConnState, EvtConnectionChanged, HOST_AGENT_VERSION,
    };
    use weft_tasks::TaskSet;

    async fn next<E: Clone + Send + 'static>(sub: &mut weft_bus::Subscription<E>) -> Option<E> {
        tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn test_reidentification_is_ignored() {
        let bus = EventBus::default();
        let network = SwarmNetwork::new(&bus).unwrap();
        let mut identified = bus.subscribe::<EvtPeerIdentified>().unwrap();
        let peer = PeerId::random();
        let conn = ConnectionId::new_unchecked(1);

        assert!(network.connection_identified(peer, conn, HOST_AGENT_VERSION).await.unwrap());
        assert!(!network.connection_identified(peer, conn, HOST_AGENT_VERSION).await.unwrap());

        assert_eq!(next(&mut identified).await, Some(EvtPeerIdentified { peer }));
        assert!(identified.try_recv().is_none());
        assert_eq!(network.identified_connections(), 1);
    }

    #[tokio::test]
    async fn test_unidentified_close_is_not_reported() {
        let bus = EventBus::default();
        let network = SwarmNetwork::new(&bus).unwrap();
        let peer = PeerId::random();

        assert!(!network.connection_closed(peer, ConnectionId::new_unchecked(7)));
    }

    #[tokio::test]
    async fn test_end_to_end_with_dispatcher() {
        let bus = EventBus::default();
        let network = Arc::new(SwarmNetwork::new(&bus).unwrap());
        let mut connections = bus.subscribe::<EvtConnectionChanged>().unwrap();

        let dispatcher = Dispatcher::new(&bus, &network, DispatchConfig::default()).unwrap();
        let (trigger, shutdown) = weft_tasks::signal();
        let mut tasks = TaskSet::new();
        let _errors = dispatcher.spawn(&mut tasks, shutdown);

        let host = PeerId::random();
        let client = PeerId::random();
        let (c1, c2) = (ConnectionId::new_unchecked(1), ConnectionId::new_unchecked(2));

        network.connection_identified(host, c1, HOST_AGENT_VERSION).await.unwrap();
        let ev = next(&mut connections).await.unwrap();
        assert_eq!((ev.peer, ev.client, ev.state), (host, false, ConnState::Opened));

        network.connection_identified(client, c2, CLIENT_AGENT_VERSION).await.unwrap();
        let ev = next(&mut connections).await.unwrap();
        assert_eq!((ev.peer, ev.client, ev.state), (client, true, ConnState::Opened));

        // Metadata survives the disconnection, so the host is still a host.
        assert!(network.connection_closed(host, c1));
        let ev = next(&mut connections).await.unwrap();
        assert_eq!((ev.peer, ev.client, ev.state), (host, false, ConnState::Closed));

        trigger.fire();
        tokio::time::timeout(Duration::from_secs(1), tasks.join_all())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_connected_host_keeps_role_under_churn() {
        let bus = EventBus::default();
        let network = Arc::new(
            SwarmNetwork::with_metadata(&bus, Arc::new(MetadataStore::new(2))).unwrap(),
        );
        let mut connections = bus.subscribe::<EvtConnectionChanged>().unwrap();

        let dispatcher = Dispatcher::new(&bus, &network, DispatchConfig::default()).unwrap();
        let (trigger, shutdown) = weft_tasks::signal();
        let mut tasks = TaskSet::new();
        let _errors = dispatcher.spawn(&mut tasks, shutdown);

        let host = PeerId::random();
        let host_conn = ConnectionId::new_unchecked(1);
        network.connection_identified(host, host_conn, HOST_AGENT_VERSION).await.unwrap();
        assert!(!next(&mut connections).await.unwrap().client);

        // More clients than the store retains identify while the host stays up.
        for i in 0..4 {
            let conn = ConnectionId::new_unchecked(10 + i);
            network
                .connection_identified(PeerId::random(), conn, CLIENT_AGENT_VERSION)
                .await
                .unwrap();
            assert!(next(&mut connections).await.unwrap().client);
        }

        assert!(network.connection_closed(host, host_conn));
        let ev = next(&mut connections).await.unwrap();
        assert_eq!((ev.peer, ev.client, ev.state), (host, false, ConnState::Closed));

        trigger.fire();
        tokio::time::timeout(Duration::from_secs(1), tasks.join_all())
            .await
            .unwrap();
    }
}
