//! Task management for weft service loops.
//!
//! - [`signal`] creates the single cancellation signal observed by every loop.
//! - [`TaskSet`] spawns named loops and joins them on stop.

mod metrics;
mod shutdown;
mod task_set;

pub use shutdown::{Shutdown, ShutdownTrigger, signal};
pub use task_set::TaskSet;
