//! Task set metrics

use core::fmt;
use metrics::Counter;

/// Task set metrics
#[derive(Clone, Debug)]
pub(crate) struct TaskSetMetrics {
    /// Number of spawned service loops
    pub(crate) spawned_tasks_total: Counter,
    /// Number of service loops that returned
    pub(crate) finished_tasks_total: Counter,
    /// Number of service loops that panicked
    pub(crate) panicked_tasks_total: Counter,
}

impl Default for TaskSetMetrics {
    fn default() -> Self {
        Self {
            spawned_tasks_total: metrics::counter!("tasks.spawned_total"),
            finished_tasks_total: metrics::counter!("tasks.finished_total"),
            panicked_tasks_total: metrics::counter!("tasks.panicked_total"),
        }
    }
}

impl TaskSetMetrics {
    /// Increments the counter for spawned tasks.
    pub(crate) fn inc_spawned(&self) {
        self.spawned_tasks_total.increment(1);
    }

    /// Increments the counter for panicked tasks.
    pub(crate) fn inc_panicked(&self) {
        self.panicked_tasks_total.increment(1);
    }
}

/// Helper type for increasing counters even if a task fails
pub(crate) struct IncCounterOnDrop(Counter);

impl fmt::Debug for IncCounterOnDrop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IncCounterOnDrop").finish()
    }
}

impl IncCounterOnDrop {
    /// Creates a new instance of `IncCounterOnDrop` with the given counter.
    pub(crate) const fn new(counter: Counter) -> Self {
        Self(counter)
    }
}

impl Drop for IncCounterOnDrop {
    /// Increment the counter when the instance is dropped.
    fn drop(&mut self) {
        self.0.increment(1);
    }
}
