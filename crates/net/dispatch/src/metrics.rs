//! Dispatcher metrics

use metrics::Counter;
use weft_primitives::ConnState;

/// Dispatcher metrics
#[derive(Clone, Debug)]
pub(crate) struct DispatchMetrics {
    /// Notifications lost to queue overflow
    dropped_total: Counter,
    /// Disconnections among them, each leaving a lease open downstream
    dropped_disconnect_total: Counter,
    /// Peers classified as clients because metadata was missing
    missing_metadata_total: Counter,
    /// Connection events emitted, by state
    opened_total: Counter,
    closed_total: Counter,
    /// Stream events emitted
    stream_events_total: Counter,
}

impl Default for DispatchMetrics {
    fn default() -> Self {
        Self {
            dropped_total: metrics::counter!("dispatch.notifications_dropped_total"),
            dropped_disconnect_total: metrics::counter!("dispatch.disconnections_dropped_total"),
            missing_metadata_total: metrics::counter!("dispatch.missing_metadata_total"),
            opened_total: metrics::counter!("dispatch.connection_events_total", "state" => "opened"),
            closed_total: metrics::counter!("dispatch.connection_events_total", "state" => "closed"),
            stream_events_total: metrics::counter!("dispatch.stream_events_total"),
        }
    }
}

impl DispatchMetrics {
    pub(crate) fn inc_dropped(&self) {
        self.dropped_total.increment(1);
    }

    pub(crate) fn inc_dropped_disconnect(&self) {
        self.dropped_disconnect_total.increment(1);
    }

    pub(crate) fn inc_missing_metadata(&self) {
        self.missing_metadata_total.increment(1);
    }

    pub(crate) fn inc_connection(&self, state: ConnState) {
        match state {
            ConnState::Opened => self.opened_total.increment(1),
            ConnState::Closed => self.closed_total.increment(1),
        }
    }

    pub(crate) fn inc_stream(&self) {
        self.stream_events_total.increment(1);
    }
}
