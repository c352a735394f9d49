//! Translation loop from raw notifications to bus events.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use weft_bus::{Emitter, EventBus, Subscription};
use weft_primitives::{
    AGENT_VERSION_KEY, CLIENT_AGENT_VERSION, ConnState, EvtConnectionChanged, EvtPeerIdentified,
    EvtStreamChanged, PeerId, StreamHandle, StreamState,
};
use weft_tasks::{Shutdown, TaskSet};

use crate::{
    DispatchError, DispatchResult, Network, NotifyHandle, NotifyQueue, OverflowPolicy,
    PeerMetadata, RawNotification, metrics::DispatchMetrics,
};

/// Default capacity of the notification queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Dispatcher configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    pub queue_capacity: usize,
    pub overflow: OverflowPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow: OverflowPolicy::default(),
        }
    }
}

/// Publishes [`EvtConnectionChanged`] and [`EvtStreamChanged`] for network activity.
///
/// `Opened` connection events are only derived from [`EvtPeerIdentified`], so
/// peer metadata is always queried after identification has completed.
/// Disconnections and stream transitions arrive through the [`NotifyHandle`]
/// registered with the network at construction.
pub struct Dispatcher {
    identified: Subscription<EvtPeerIdentified>,
    connections: Emitter<EvtConnectionChanged>,
    streams: Emitter<EvtStreamChanged>,
    queue: NotifyQueue,
    metadata: Arc<dyn PeerMetadata>,
    metrics: DispatchMetrics,
}

impl core::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("identified", &self.identified)
            .field("connections", &self.connections)
            .field("streams", &self.streams)
            .field("queue", &self.queue)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

enum Step {
    Identified(PeerId),
    Raw(RawNotification),
}

impl Dispatcher {
    /// Acquire bus handles and register with `network`.
    pub fn new<N: Network + ?Sized>(
        bus: &EventBus,
        network: &N,
        config: DispatchConfig,
    ) -> DispatchResult<Self> {
        let identified = bus.subscribe().map_err(DispatchError::Setup)?;
        let connections = bus.emitter().map_err(DispatchError::Setup)?;
        let streams = bus.emitter().map_err(DispatchError::Setup)?;

        let metrics = DispatchMetrics::default();
        let queue = NotifyQueue::new(config.queue_capacity, config.overflow);
        network.notify(NotifyHandle::new(queue.clone(), metrics.clone()));

        Ok(Self {
            identified,
            connections,
            streams,
            queue,
            metadata: network.metadata(),
            metrics,
        })
    }

    pub fn queue(&self) -> &NotifyQueue {
        &self.queue
    }

    /// Spawn the dispatch loop. Failures are reported on the returned channel.
    pub fn spawn(self, tasks: &mut TaskSet, shutdown: Shutdown) -> mpsc::Receiver<DispatchError> {
        let (errors_tx, errors_rx) = mpsc::channel(1);
        tasks.spawn("net-dispatch", self.run(shutdown, errors_tx));
        errors_rx
    }

    async fn run(mut self, mut shutdown: Shutdown, errors: mpsc::Sender<DispatchError>) {
        debug!("Network dispatcher started");
        match self.dispatch(&mut shutdown).await {
            Ok(()) => debug!("Network dispatcher stopped"),
            Err(e) => {
                warn!(error = %e, "Network dispatcher terminated");
                let _ = errors.try_send(e);
            }
        }
    }

    async fn dispatch(&mut self, shutdown: &mut Shutdown) -> DispatchResult<()> {
        loop {
            let step = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(()),
                ev = self.identified.recv() => match ev {
                    Some(EvtPeerIdentified { peer }) => Step::Identified(peer),
                    None => {
                        debug!("Identification stream ended");
                        return Ok(());
                    }
                },
                notification = self.queue.pop() => match notification {
                    Some(notification) => Step::Raw(notification),
                    None => return Ok(()),
                },
            };

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(()),
                result = self.handle(step) => result?,
            }
        }
    }

    async fn handle(&self, step: Step) -> DispatchResult<()> {
        match step {
            Step::Identified(peer) => self.emit_connection(peer, ConnState::Opened).await,
            Step::Raw(RawNotification::Disconnected { peer }) => {
                self.emit_connection(peer, ConnState::Closed).await
            }
            Step::Raw(RawNotification::StreamOpened { peer, stream }) => {
                self.emit_stream(peer, stream, StreamState::Opened).await
            }
            Step::Raw(RawNotification::StreamClosed { peer, stream }) => {
                self.emit_stream(peer, stream, StreamState::Closed).await
            }
        }
    }

    async fn emit_connection(&self, peer: PeerId, state: ConnState) -> DispatchResult<()> {
        let client = self.is_client(&peer);
        trace!(%peer, %state, client, "Connection changed");

        self.connections
            .emit(EvtConnectionChanged {
                peer,
                client,
                state,
            })
            .await
            .map_err(|source| DispatchError::Emit {
                event: "connection changed",
                source,
            })?;

        self.metrics.inc_connection(state);
        Ok(())
    }

    async fn emit_stream(
        &self,
        peer: PeerId,
        stream: StreamHandle,
        state: StreamState,
    ) -> DispatchResult<()> {
        trace!(%peer, %stream, %state, "Stream changed");

        self.streams
            .emit(EvtStreamChanged {
                peer,
                stream,
                state,
            })
            .await
            .map_err(|source| DispatchError::Emit {
                event: "stream changed",
                source,
            })?;

        self.metrics.inc_stream();
        Ok(())
    }

    /// Distinguish client and host connections by advertised agent version.
    ///
    /// Disconnections race metadata eviction in the network layer, so a missing
    /// agent version classifies the peer as a client instead of failing.
    fn is_client(&self, peer: &PeerId) -> bool {
        match self.metadata.get(peer, AGENT_VERSION_KEY) {
            Some(agent) => agent == CLIENT_AGENT_VERSION,
            None => {
                self.metrics.inc_missing_metadata();
                debug!(%peer, "Agent version unavailable, classifying peer as client");
                true
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // Callbacks after this point are discarded.
        self.queue.close();
    }
}
