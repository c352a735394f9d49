//! Tracker metrics

use metrics::{Counter, Gauge};

#[derive(Clone, Debug)]
pub(crate) struct TrackerMetrics {
    /// Distinct connected host peers
    pub(crate) peers: Gauge,
    pub(crate) leases_total: Counter,
    pub(crate) evictions_total: Counter,
    /// Connection events from client peers
    pub(crate) client_events_total: Counter,
}

impl Default for TrackerMetrics {
    fn default() -> Self {
        Self {
            peers: metrics::gauge!("neighborhood.peers"),
            leases_total: metrics::counter!("neighborhood.leases_total"),
            evictions_total: metrics::counter!("neighborhood.evictions_total"),
            client_events_total: metrics::counter!("neighborhood.client_events_total"),
        }
    }
}
