//! Connectivity management for weft hosts.
//!
//! Wires the event translator, neighborhood tracker, graph coordinator and
//! timestep ticker onto one [`EventBus`] under one cancellation signal:
//!
//! ```text
//! network ──▶ Dispatcher ──EvtConnectionChanged──▶ Tracker
//!                                                    │
//!                                        EvtNeighborhoodChanged
//!                                                    ▼
//!             Ticker ──────────EvtTimestep────────▶ Graph ──▶ ControlRequest
//! ```
//!
//! Consumers subscribe to [`ControlRequest`](weft_primitives::ControlRequest)
//! on the same bus to act on boot, graft and prune signals.

mod config;
mod error;

pub use config::{ConfigError, ConnectivityConfig};
pub use error::ConnectivityError;

use tokio::sync::mpsc;
use tracing::info;
use weft_bus::EventBus;
use weft_graph::{Graph, GraphError, Ticker};
use weft_net_dispatch::{DispatchError, Dispatcher, Network};
use weft_neighborhood::{NeighborhoodError, Tracker};
use weft_primitives::PeerId;
use weft_tasks::{Shutdown, ShutdownTrigger, TaskSet};

/// Entry point of the connectivity pipeline.
#[derive(Debug)]
pub struct Connectivity;

impl Connectivity {
    /// Start every connectivity loop on `bus`.
    ///
    /// All subscriptions and emitters are acquired before any loop is spawned,
    /// so a setup failure leaves nothing running.
    pub fn start<N: Network + ?Sized>(
        bus: &EventBus,
        network: &N,
        local_peer: &PeerId,
        config: &ConnectivityConfig,
    ) -> Result<ConnectivityHandle, ConnectivityError> {
        config.validate()?;

        let dispatcher = Dispatcher::new(bus, network, config.dispatch())?;
        let tracker = Tracker::new(bus, config.neighborhood())?;
        let graph = Graph::new(bus, config.graph(local_peer))?;
        let ticker = Ticker::new(bus, config.tick())?;

        let (trigger, shutdown) = weft_tasks::signal();
        let mut tasks = TaskSet::new();

        let errors = ErrorChannels {
            dispatch: Some(dispatcher.spawn(&mut tasks, shutdown.clone())),
            neighborhood: Some(tracker.spawn(&mut tasks, shutdown.clone())),
            graph: Some(graph.spawn(&mut tasks, shutdown.clone())),
            ticker: Some(ticker.spawn(&mut tasks, shutdown)),
        };

        info!(
            %local_peer,
            tasks = tasks.len(),
            kmin = config.kmin,
            kmax = config.kmax,
            period = ?config.period(),
            jitter = ?config.jitter(),
            "Connectivity started"
        );

        Ok(ConnectivityHandle {
            trigger,
            tasks,
            errors,
        })
    }
}

/// Handle to a running connectivity pipeline.
///
/// Dropping the handle fires the cancellation signal without waiting for the
/// loops to exit.
#[derive(Debug)]
pub struct ConnectivityHandle {
    trigger: ShutdownTrigger,
    tasks: TaskSet,
    errors: ErrorChannels,
}

impl ConnectivityHandle {
    /// A listener for the pipeline's cancellation signal.
    pub fn shutdown(&self) -> Shutdown {
        self.trigger.subscribe()
    }

    /// Wait for the next error raised by any loop.
    ///
    /// Returns `None` once every loop has exited.
    pub async fn next_error(&mut self) -> Option<ConnectivityError> {
        self.errors.next().await
    }

    /// Fire the cancellation signal and wait for every loop to exit.
    ///
    /// On return every subscription and emitter held by the pipeline has been
    /// released.
    pub async fn stop(self) {
        self.trigger.fire();
        self.tasks.join_all().await;
        info!("Connectivity stopped");
    }
}

#[derive(Debug)]
struct ErrorChannels {
    dispatch: Option<mpsc::Receiver<DispatchError>>,
    neighborhood: Option<mpsc::Receiver<NeighborhoodError>>,
    graph: Option<mpsc::Receiver<GraphError>>,
    ticker: Option<mpsc::Receiver<GraphError>>,
}

impl ErrorChannels {
    fn is_closed(&self) -> bool {
        self.dispatch.is_none()
            && self.neighborhood.is_none()
            && self.graph.is_none()
            && self.ticker.is_none()
    }

    async fn next(&mut self) -> Option<ConnectivityError> {
        while !self.is_closed() {
            let err = tokio::select! {
                err = recv(&mut self.dispatch) => err.map(ConnectivityError::from),
                err = recv(&mut self.neighborhood) => err.map(ConnectivityError::from),
                err = recv(&mut self.graph) => err.map(ConnectivityError::from),
                err = recv(&mut self.ticker) => err.map(ConnectivityError::from),
            };

            if err.is_some() {
                return err;
            }
        }
        None
    }
}

/// Receive from `rx`, clearing it once the sender is gone.
async fn recv<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    let Some(inner) = rx.as_mut() else {
        return std::future::pending().await;
    };

    let item = inner.recv().await;
    if item.is_none() {
        *rx = None;
    }
    item
}
