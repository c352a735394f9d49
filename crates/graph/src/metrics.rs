//! Coordinator metrics

use metrics::Counter;
use weft_primitives::ControlRequest;

#[derive(Clone, Debug)]
pub(crate) struct GraphMetrics {
    /// Scheduler deadlines reached
    pub(crate) firings_total: Counter,
    boot: Counter,
    graft: Counter,
    prune: Counter,
}

impl Default for GraphMetrics {
    fn default() -> Self {
        let request = |r: ControlRequest| {
            let label: &'static str = r.into();
            metrics::counter!("graph.control_requests", "request" => label)
        };

        Self {
            firings_total: metrics::counter!("graph.scheduler_firings_total"),
            boot: request(ControlRequest::Boot),
            graft: request(ControlRequest::Graft),
            prune: request(ControlRequest::Prune),
        }
    }
}

impl GraphMetrics {
    pub(crate) fn inc_request(&self, request: ControlRequest) {
        match request {
            ControlRequest::Boot => self.boot.increment(1),
            ControlRequest::Graft => self.graft.increment(1),
            ControlRequest::Prune => self.prune.increment(1),
        }
    }
}
