//! Graph coordinator.
//!
//! Converts the neighborhood change stream into rate-limited
//! [`ControlRequest`](weft_primitives::ControlRequest)s. Requests are only issued
//! when a jittered [`Scheduler`] deadline is reached, so the request rate is
//! independent of connection churn and nodes sharing a period do not fire in
//! lockstep. A node stuck in a bad phase keeps receiving the same request on
//! every deadline.

mod error;
mod graph;
mod metrics;
mod scheduler;
mod ticker;

pub use error::{GraphError, GraphResult};
pub use graph::{DEFAULT_JITTER, DEFAULT_PERIOD, Graph, GraphConfig};
pub use scheduler::Scheduler;
pub use ticker::{DEFAULT_TICK, Ticker};
