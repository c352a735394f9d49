//! Periodic [`EvtTimestep`] source.

use std::time::Duration;

use tokio::{sync::mpsc, time::MissedTickBehavior};
use tracing::{debug, warn};
use weft_bus::{Emitter, EventBus};
use weft_primitives::EvtTimestep;
use weft_tasks::{Shutdown, TaskSet};

use crate::{GraphError, GraphResult};

/// Default interval between timesteps.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Publishes the elapsed time on the bus at a fixed interval.
#[derive(Debug)]
pub struct Ticker {
    period: Duration,
    timesteps: Emitter<EvtTimestep>,
}

impl Ticker {
    /// A zero `period` is rejected.
    pub fn new(bus: &EventBus, period: Duration) -> GraphResult<Self> {
        if period.is_zero() {
            return Err(GraphError::ZeroPeriod);
        }

        Ok(Self {
            period,
            timesteps: bus.emitter().map_err(GraphError::Setup)?,
        })
    }

    pub fn spawn(self, tasks: &mut TaskSet, shutdown: Shutdown) -> mpsc::Receiver<GraphError> {
        let (errors_tx, errors_rx) = mpsc::channel(1);
        tasks.spawn("graph-ticker", self.run(shutdown, errors_tx));
        errors_rx
    }

    async fn run(self, mut shutdown: Shutdown, errors: mpsc::Sender<GraphError>) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first tick completes immediately.
        let mut last = interval.tick().await;
        debug!(period = ?self.period, "Ticker started");

        loop {
            let now = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                now = interval.tick() => now,
            };

            let delta = now.duration_since(last);
            last = now;

            let result = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                result = self.timesteps.emit(EvtTimestep { delta }) => result,
            };

            if let Err(source) = result {
                warn!(error = %source, "Failed to emit timestep");
                let _ = errors.try_send(GraphError::Emit {
                    event: "timestep",
                    source,
                });
                break;
            }
        }

        debug!("Ticker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use weft_bus::BusError;

    #[test]
    fn test_zero_period_rejected() {
        let bus = EventBus::default();
        assert_matches!(Ticker::new(&bus, Duration::ZERO), Err(GraphError::ZeroPeriod));
    }

    #[tokio::test(start_paused = true)]
    async fn test_emits_elapsed_deltas() {
        let bus = EventBus::default();
        let mut timesteps = bus.subscribe::<EvtTimestep>().unwrap();
        let ticker = Ticker::new(&bus, Duration::from_secs(1)).unwrap();

        let (trigger, shutdown) = weft_tasks::signal();
        let mut tasks = TaskSet::new();
        let _errors = ticker.spawn(&mut tasks, shutdown);

        for _ in 0..3 {
            assert_eq!(
                timesteps.recv().await,
                Some(EvtTimestep {
                    delta: Duration::from_secs(1)
                })
            );
        }

        trigger.fire();
        tasks.join_all().await;
        assert_eq!(timesteps.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_bus_reported() {
        let bus = EventBus::default();
        let ticker = Ticker::new(&bus, Duration::from_secs(1)).unwrap();

        let (_trigger, shutdown) = weft_tasks::signal();
        let mut tasks = TaskSet::new();
        let mut errors = ticker.spawn(&mut tasks, shutdown);
        bus.close();

        assert_matches!(
            errors.recv().await,
            Some(GraphError::Emit {
                event: "timestep",
                source: BusError::Closed
            })
        );
        tasks.join_all().await;
    }
}
