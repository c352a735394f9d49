//! Rate-limited translation of neighborhood phases into control requests.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use weft_bus::{Emitter, EventBus, Subscription};
use weft_primitives::{ControlRequest, EvtNeighborhoodChanged, EvtTimestep, PeerId, Phase};
use weft_tasks::{Shutdown, TaskSet};

use crate::{GraphError, GraphResult, Scheduler, metrics::GraphMetrics};

/// Default base period between control decisions.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(60);

/// Default jitter window around [`DEFAULT_PERIOD`].
pub const DEFAULT_JITTER: Duration = Duration::from_secs(15);

/// Coordinator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphConfig {
    pub period: Duration,
    pub jitter: Duration,
    pub seed: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            jitter: DEFAULT_JITTER,
            seed: 0,
        }
    }
}

impl GraphConfig {
    /// Configuration seeded from the local peer identity.
    pub fn for_peer(period: Duration, jitter: Duration, peer: &PeerId) -> Self {
        Self {
            period,
            jitter,
            seed: Scheduler::seed_from_peer(peer),
        }
    }

    pub fn validate(&self) -> GraphResult<()> {
        if self.period.is_zero() {
            return Err(GraphError::ZeroPeriod);
        }
        if self.jitter > self.period {
            return Err(GraphError::InvalidJitter {
                period: self.period,
                jitter: self.jitter,
            });
        }
        Ok(())
    }
}

/// Turns neighborhood changes into at most one [`ControlRequest`] per
/// scheduler deadline.
///
/// Two loops run per coordinator:
/// - the schedule loop caches the latest neighborhood phase and advances the
///   [`Scheduler`] on every [`EvtTimestep`], forwarding the cached phase when
///   the deadline is reached;
/// - the emit loop maps each forwarded phase to a request and publishes it.
///
/// Before any neighborhood event is observed the node is assumed orphaned.
#[derive(Debug)]
pub struct Graph {
    scheduler: Scheduler,
    timesteps: Subscription<EvtTimestep>,
    changes: Subscription<EvtNeighborhoodChanged>,
    requests: Emitter<ControlRequest>,
    metrics: GraphMetrics,
}

impl Graph {
    pub fn new(bus: &EventBus, config: GraphConfig) -> GraphResult<Self> {
        config.validate()?;

        Ok(Self {
            scheduler: Scheduler::new(config.period, config.jitter, config.seed),
            timesteps: bus.subscribe().map_err(GraphError::Setup)?,
            changes: bus.subscribe().map_err(GraphError::Setup)?,
            requests: bus.emitter().map_err(GraphError::Setup)?,
            metrics: GraphMetrics::default(),
        })
    }

    /// Spawn the schedule and emit loops. Emission failures are reported on
    /// the returned channel.
    pub fn spawn(self, tasks: &mut TaskSet, shutdown: Shutdown) -> mpsc::Receiver<GraphError> {
        let Self {
            scheduler,
            timesteps,
            changes,
            requests,
            metrics,
        } = self;

        let (phases_tx, phases_rx) = mpsc::channel(1);
        let (errors_tx, errors_rx) = mpsc::channel(1);

        let schedule = ScheduleLoop {
            scheduler,
            timesteps,
            changes,
            phases: phases_tx,
            cached: Phase::Orphaned,
            metrics: metrics.clone(),
        };
        let emit = EmitLoop {
            phases: phases_rx,
            requests,
            errors: errors_tx,
            metrics,
        };

        tasks.spawn("graph-schedule", schedule.run(shutdown.clone()));
        tasks.spawn("graph-emit", emit.run(shutdown));
        errors_rx
    }
}

struct ScheduleLoop {
    scheduler: Scheduler,
    timesteps: Subscription<EvtTimestep>,
    changes: Subscription<EvtNeighborhoodChanged>,
    phases: mpsc::Sender<Phase>,
    /// Latest neighborhood phase. Older values are overwritten, never queued.
    cached: Phase,
    metrics: GraphMetrics,
}

impl ScheduleLoop {
    async fn run(mut self, mut shutdown: Shutdown) {
        debug!(
            period = ?self.scheduler.base(),
            jitter = ?self.scheduler.jitter(),
            deadline = ?self.scheduler.deadline(),
            "Graph scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                change = self.changes.recv() => match change {
                    Some(change) => {
                        trace!(phase = %change.to, count = change.count, "Cached neighborhood phase");
                        self.cached = change.to;
                    }
                    None => {
                        debug!("Neighborhood stream ended");
                        break;
                    }
                },
                step = self.timesteps.recv() => match step {
                    Some(EvtTimestep { delta }) => {
                        if !self.scheduler.advance(delta) {
                            continue;
                        }

                        self.scheduler.reset();
                        self.metrics.firings_total.increment(1);
                        trace!(phase = %self.cached, next = ?self.scheduler.deadline(), "Scheduler fired");

                        let sent = tokio::select! {
                            biased;
                            _ = shutdown.cancelled() => break,
                            sent = self.phases.send(self.cached) => sent,
                        };
                        if sent.is_err() {
                            debug!("Emit loop gone");
                            break;
                        }
                    }
                    None => {
                        debug!("Timestep stream ended");
                        break;
                    }
                },
            }
        }

        debug!("Graph scheduler stopped");
    }
}

struct EmitLoop {
    phases: mpsc::Receiver<Phase>,
    requests: Emitter<ControlRequest>,
    errors: mpsc::Sender<GraphError>,
    metrics: GraphMetrics,
}

impl EmitLoop {
    async fn run(mut self, mut shutdown: Shutdown) {
        loop {
            let phase = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                phase = self.phases.recv() => match phase {
                    Some(phase) => phase,
                    None => break,
                },
            };

            let Some(request) = ControlRequest::for_phase(phase) else {
                trace!(%phase, "Neighborhood complete, no request");
                continue;
            };

            let result = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                result = self.requests.emit(request) => result,
            };

            match result {
                Ok(()) => {
                    self.metrics.inc_request(request);
                    info!(%request, %phase, "Issued control request");
                }
                Err(source) => {
                    warn!(%request, error = %source, "Failed to issue control request");
                    let err = GraphError::Emit {
                        event: request.into(),
                        source,
                    };
                    if self.errors.try_send(err).is_err() {
                        warn!("Error channel full, stopping graph coordinator");
                        break;
                    }
                }
            }
        }

        debug!("Graph emit loop stopped");
    }
}
