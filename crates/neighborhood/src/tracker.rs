//! Single-owner loop maintaining the [`Neighborhood`].

use tokio::sync::mpsc;
use tracing::{debug, error, trace};
use weft_bus::{Emitter, EventBus, Subscription};
use weft_primitives::{ConnState, EvtConnectionChanged, EvtNeighborhoodChanged, Phase};
use weft_tasks::{Shutdown, TaskSet};

use crate::{
    Neighborhood, NeighborhoodConfig, NeighborhoodError, NeighborhoodResult,
    metrics::TrackerMetrics,
};

/// Consumes [`EvtConnectionChanged`] and publishes [`EvtNeighborhoodChanged`]
/// on every lease and eviction of a host peer.
///
/// The neighborhood map is owned by the tracker loop. Other components observe
/// it through the published events only.
#[derive(Debug)]
pub struct Tracker {
    neighborhood: Neighborhood,
    /// Phase carried by the previous emission.
    last: Phase,
    connections: Subscription<EvtConnectionChanged>,
    changes: Emitter<EvtNeighborhoodChanged>,
    metrics: TrackerMetrics,
}

impl Tracker {
    pub fn new(bus: &EventBus, config: NeighborhoodConfig) -> NeighborhoodResult<Self> {
        config.validate()?;

        Ok(Self {
            neighborhood: Neighborhood::new(config),
            last: Phase::Orphaned,
            connections: bus.subscribe().map_err(NeighborhoodError::Setup)?,
            changes: bus.emitter().map_err(NeighborhoodError::Setup)?,
            metrics: TrackerMetrics::default(),
        })
    }

    pub fn neighborhood(&self) -> &Neighborhood {
        &self.neighborhood
    }

    /// Apply one connection event, returning the change to publish if any.
    ///
    /// Client connections and repeat connections to a known peer only update
    /// bookkeeping.
    pub fn apply(
        &mut self,
        event: EvtConnectionChanged,
    ) -> NeighborhoodResult<Option<EvtNeighborhoodChanged>> {
        let EvtConnectionChanged {
            peer,
            client,
            state,
        } = event;

        if client {
            self.metrics.client_events_total.increment(1);
            trace!(%peer, %state, "Ignoring client connection");
            return Ok(None);
        }

        let changed = match state {
            ConnState::Opened => {
                let lease = self.neighborhood.add(peer);
                if lease {
                    self.metrics.leases_total.increment(1);
                }
                lease
            }
            ConnState::Closed => {
                let eviction = self.neighborhood.remove(&peer)?;
                if eviction {
                    self.metrics.evictions_total.increment(1);
                }
                eviction
            }
        };

        if !changed {
            trace!(
                %peer,
                %state,
                connections = self.neighborhood.connections(&peer),
                "Connection count updated"
            );
            return Ok(None);
        }

        let count = self.neighborhood.len();
        let to = self.neighborhood.phase();
        let from = std::mem::replace(&mut self.last, to);
        self.metrics.peers.set(count as f64);

        if from != to {
            debug!(%peer, %from, %to, count, "Neighborhood phase changed");
        } else {
            trace!(%peer, %state, phase = %to, count, "Neighborhood changed");
        }

        Ok(Some(EvtNeighborhoodChanged {
            peer,
            state,
            from,
            to,
            count,
        }))
    }

    /// Spawn the tracker loop. A protocol violation or failed emission is
    /// reported on the returned channel and ends the loop.
    pub fn spawn(
        self,
        tasks: &mut TaskSet,
        shutdown: Shutdown,
    ) -> mpsc::Receiver<NeighborhoodError> {
        let (errors_tx, errors_rx) = mpsc::channel(1);
        tasks.spawn("neighborhood-tracker", self.run(shutdown, errors_tx));
        errors_rx
    }

    async fn run(mut self, mut shutdown: Shutdown, errors: mpsc::Sender<NeighborhoodError>) {
        debug!(
            kmin = self.neighborhood.config().kmin,
            kmax = self.neighborhood.config().kmax,
            "Neighborhood tracker started"
        );

        match self.track(&mut shutdown).await {
            Ok(()) => debug!(peers = self.neighborhood.len(), "Neighborhood tracker stopped"),
            Err(e) => {
                error!(error = %e, "Neighborhood tracker terminated");
                let _ = errors.try_send(e);
            }
        }
    }

    async fn track(&mut self, shutdown: &mut Shutdown) -> NeighborhoodResult<()> {
        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(()),
                event = self.connections.recv() => match event {
                    Some(event) => event,
                    None => {
                        debug!("Connection stream ended");
                        return Ok(());
                    }
                },
            };

            let Some(change) = self.apply(event)? else {
                continue;
            };

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(()),
                result = self.changes.emit(change) => result.map_err(NeighborhoodError::Emit)?,
            }
        }
    }
}
