//! Named service loops joined on stop.

use std::future::Future;

use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

use crate::metrics::{IncCounterOnDrop, TaskSetMetrics};

/// Owns the join handles of a group of long-lived loops.
#[derive(Debug, Default)]
pub struct TaskSet {
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    metrics: TaskSetMetrics,
}

impl TaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` on the current tokio runtime under `name`.
    pub fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.metrics.inc_spawned();
        let finished = IncCounterOnDrop::new(self.metrics.finished_tasks_total.clone());

        let handle = tokio::spawn(async move {
            let _finished = finished;
            task.await;
            trace!(task = name, "Task finished");
        });

        debug!(task = name, "Task spawned");
        self.tasks.push((name, handle));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every task to return.
    pub async fn join_all(self) {
        for (name, handle) in self.tasks {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    self.metrics.inc_panicked();
                    error!(task = name, error = %e, "Task panicked");
                } else {
                    debug!(task = name, "Task cancelled");
                }
            }
        }
    }
}
