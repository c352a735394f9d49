//! libp2p host driving the connectivity pipeline.
//!
//! # Transport Stack
//!
//! ```text
//! DNS
//!   └── TCP
//!         └── Noise (encryption)
//!               └── Yamux (multiplexing)
//! ```
//!
//! # Behaviours
//!
//! - Identify: advertises the host agent version and feeds peer metadata
//! - Ping: liveness

use std::{collections::HashSet, sync::Arc, time::Duration};

use eyre::Result;
use futures::StreamExt;
use libp2p::{
    Multiaddr, PeerId, Swarm, SwarmBuilder, identify,
    identity::PublicKey,
    noise, ping,
    swarm::{NetworkBehaviour, SwarmEvent},
    tcp, yamux,
};
use rand::seq::IteratorRandom;
use tracing::{debug, info, warn};
use weft_bus::Subscription;
use weft_net_dispatch::SwarmNetwork;
use weft_primitives::{ConnState, ControlRequest, EvtNeighborhoodChanged, HOST_AGENT_VERSION};

/// Connections without active streams are kept this long.
const IDLE_CONNECTION_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(NetworkBehaviour)]
pub(crate) struct WeftBehaviour {
    identify: identify::Behaviour,
    ping: ping::Behaviour,
}

impl WeftBehaviour {
    fn new(ns: &str, local_public_key: PublicKey) -> Self {
        Self {
            identify: identify::Behaviour::new(
                identify::Config::new(format!("/weft/{ns}/1.0.0"), local_public_key)
                    .with_agent_version(HOST_AGENT_VERSION.to_string()),
            ),
            ping: ping::Behaviour::new(ping::Config::new().with_interval(Duration::from_secs(15))),
        }
    }
}

/// Host peers currently leased into the neighborhood, as published on the bus.
#[derive(Debug, Default)]
struct Neighbors(HashSet<PeerId>);

impl Neighbors {
    fn apply(&mut self, change: &EvtNeighborhoodChanged) {
        match change.state {
            ConnState::Opened => {
                self.0.insert(change.peer);
            }
            ConnState::Closed => {
                self.0.remove(&change.peer);
            }
        }
    }

    /// A random neighbor for which `connected` holds.
    fn prune_candidate(&self, connected: impl Fn(&PeerId) -> bool) -> Option<PeerId> {
        self.0
            .iter()
            .filter(|peer| connected(peer))
            .copied()
            .choose(&mut rand::rng())
    }
}

/// Owns the swarm and acts on control requests.
pub(crate) struct Host {
    swarm: Swarm<WeftBehaviour>,
    network: Arc<SwarmNetwork>,
    join: Vec<Multiaddr>,
    neighbors: Neighbors,
}

impl Host {
    pub(crate) fn new(ns: &str, network: Arc<SwarmNetwork>, join: Vec<Multiaddr>) -> Result<Self> {
        let swarm = SwarmBuilder::with_new_identity()
            .with_tokio()
            .with_tcp(
                tcp::Config::default(),
                noise::Config::new,
                yamux::Config::default,
            )?
            .with_dns()?
            .with_behaviour(|keypair| WeftBehaviour::new(ns, keypair.public()))?
            .with_swarm_config(|cfg| cfg.with_idle_connection_timeout(IDLE_CONNECTION_TIMEOUT))
            .build();

        Ok(Self {
            swarm,
            network,
            join,
            neighbors: Neighbors::default(),
        })
    }

    pub(crate) fn local_peer_id(&self) -> PeerId {
        *self.swarm.local_peer_id()
    }

    pub(crate) fn listen(&mut self, addrs: &[Multiaddr]) {
        for addr in addrs {
            match self.swarm.listen_on(addr.clone()) {
                Ok(_) => debug!(%addr, "Listen requested"),
                Err(e) => warn!(%addr, %e, "Failed to listen on address"),
            }
        }
    }

    /// Dial every join address.
    pub(crate) fn dial_join(&mut self) -> usize {
        if self.join.is_empty() {
            debug!("No join addresses configured");
            return 0;
        }

        let mut dialed = 0;
        for addr in &self.join {
            match self.swarm.dial(addr.clone()) {
                Ok(()) => {
                    debug!(%addr, "Dial initiated");
                    dialed += 1;
                }
                Err(e) => warn!(%addr, %e, "Failed to dial join address"),
            }
        }
        dialed
    }

    /// Process swarm events and control requests until the request stream ends.
    ///
    /// `changes` keeps the set of prunable neighbors current.
    pub(crate) async fn run(
        mut self,
        mut requests: Subscription<ControlRequest>,
        mut changes: Subscription<EvtNeighborhoodChanged>,
    ) -> Result<()> {
        info!("Starting host event loop");
        let mut tracking = true;

        loop {
            tokio::select! {
                event = self.swarm.select_next_some() => self.on_swarm_event(event).await?,
                change = changes.recv(), if tracking => match change {
                    Some(change) => self.neighbors.apply(&change),
                    None => {
                        debug!("Neighborhood stream ended");
                        tracking = false;
                    }
                },
                request = requests.recv() => match request {
                    Some(request) => self.on_request(request),
                    None => {
                        debug!("Control request stream ended");
                        return Ok(());
                    }
                },
            }
        }
    }

    async fn on_swarm_event(&mut self, event: SwarmEvent<WeftBehaviourEvent>) -> Result<()> {
        self.network.on_swarm_event(&event);

        match event {
            SwarmEvent::NewListenAddr { address, .. } => {
                info!(%address, "Listening");
            }
            SwarmEvent::ConnectionEstablished {
                peer_id,
                endpoint,
                num_established,
                ..
            } => {
                debug!(
                    %peer_id,
                    endpoint = %endpoint.get_remote_address(),
                    num_established,
                    "Connection established"
                );
            }
            SwarmEvent::ConnectionClosed {
                peer_id,
                cause,
                num_established,
                ..
            } => {
                debug!(%peer_id, num_established, cause = ?cause, "Connection closed");
            }
            SwarmEvent::OutgoingConnectionError { peer_id, error, .. } => {
                warn!(?peer_id, %error, "Outgoing connection error");
            }
            SwarmEvent::Behaviour(WeftBehaviourEvent::Identify(event)) => {
                if let identify::Event::Error { peer_id, error, .. } = &event {
                    warn!(%peer_id, %error, "Identify error");
                }
                self.network.on_identify_event(&event).await?;
            }
            SwarmEvent::Behaviour(WeftBehaviourEvent::Ping(ping::Event { peer, result, .. })) => {
                match result {
                    Ok(rtt) => debug!(%peer, ?rtt, "Ping success"),
                    Err(e) => debug!(%peer, %e, "Ping failed"),
                }
            }
            _ => {}
        }

        Ok(())
    }

    fn on_request(&mut self, request: ControlRequest) {
        match request {
            ControlRequest::Boot | ControlRequest::Graft => {
                let dialed = self.dial_join();
                info!(%request, dialed, "Redialing join addresses");
            }
            ControlRequest::Prune => {
                let swarm = &self.swarm;
                match self.neighbors.prune_candidate(|peer| swarm.is_connected(peer)) {
                    Some(peer) => {
                        info!(%peer, "Pruning connection");
                        if self.swarm.disconnect_peer_id(peer).is_err() {
                            debug!(%peer, "Peer already disconnected");
                        }
                    }
                    None => debug!("Nothing to prune"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_primitives::Phase;

    fn change(peer: PeerId, state: ConnState) -> EvtNeighborhoodChanged {
        EvtNeighborhoodChanged {
            peer,
            state,
            from: Phase::Partial,
            to: Phase::Partial,
            count: 1,
        }
    }

    #[test]
    fn test_prune_picks_connected_neighbor() {
        let mut neighbors = Neighbors::default();
        let (a, b) = (PeerId::random(), PeerId::random());

        assert_eq!(neighbors.prune_candidate(|_| true), None);

        neighbors.apply(&change(a, ConnState::Opened));
        neighbors.apply(&change(b, ConnState::Opened));
        for _ in 0..16 {
            assert_eq!(neighbors.prune_candidate(|peer| *peer == b), Some(b));
        }

        neighbors.apply(&change(b, ConnState::Closed));
        assert_eq!(neighbors.prune_candidate(|_| true), Some(a));
        assert_eq!(neighbors.prune_candidate(|peer| *peer == b), None);
    }

    #[test]
    fn test_connected_client_is_not_prunable() {
        let mut neighbors = Neighbors::default();
        let (host, client) = (PeerId::random(), PeerId::random());
        neighbors.apply(&change(host, ConnState::Opened));

        // Clients never enter the neighborhood.
        assert_eq!(neighbors.prune_candidate(|peer| *peer == client), None);
    }
}
