//! Bounded, non-blocking hand-off between network callbacks and the dispatcher.
//!
//! Network callbacks push into the queue and return immediately. When the queue
//! is full the configured [`OverflowPolicy`] decides which notification is lost.

use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{debug, warn};
use weft_primitives::{PeerId, StreamHandle};

use crate::{Notifiee, metrics::DispatchMetrics};

/// Raw notification captured from a network callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawNotification {
    Disconnected { peer: PeerId },
    StreamOpened { peer: PeerId, stream: StreamHandle },
    StreamClosed { peer: PeerId, stream: StreamHandle },
}

impl RawNotification {
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected { .. })
    }

    pub fn peer(&self) -> &PeerId {
        match self {
            Self::Disconnected { peer }
            | Self::StreamOpened { peer, .. }
            | Self::StreamClosed { peer, .. } => peer,
        }
    }
}

/// Which notification to discard when the queue is full.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Evict the oldest queued stream notification to make room, or the
    /// oldest disconnection when none is queued.
    #[default]
    DropOldest,
    /// Discard the incoming notification.
    DropNewest,
}

/// Result of a [`NotifyQueue::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed,
    /// Queued after evicting the returned notification.
    ///
    /// The evicted notification is the oldest stream notification when one is
    /// queued, not necessarily the head of the queue.
    DroppedOldest(RawNotification),
    /// The incoming notification was discarded.
    DroppedNewest,
    /// The queue is closed; the notification was discarded.
    Closed,
}

/// Single-consumer bounded queue. Cloning yields another producer handle.
#[derive(Debug, Clone)]
pub struct NotifyQueue {
    inner: Arc<QueueInner>,
}

#[derive(Debug)]
struct QueueInner {
    capacity: usize,
    policy: OverflowPolicy,
    state: Mutex<QueueState>,
    notify: Notify,
}

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<RawNotification>,
    closed: bool,
}

impl NotifyQueue {
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(QueueInner {
                capacity,
                policy,
                state: Mutex::new(QueueState {
                    items: VecDeque::with_capacity(capacity),
                    closed: false,
                }),
                notify: Notify::new(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.inner.policy
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Enqueue without blocking.
    pub fn push(&self, notification: RawNotification) -> PushOutcome {
        let outcome = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return PushOutcome::Closed;
            }

            if state.items.len() < self.inner.capacity {
                state.items.push_back(notification);
                PushOutcome::Pushed
            } else {
                match self.inner.policy {
                    OverflowPolicy::DropNewest => return PushOutcome::DroppedNewest,
                    OverflowPolicy::DropOldest => {
                        // Stream notifications go first; a lost disconnection
                        // leaves a lease open downstream.
                        let stream = state.items.iter().position(|n| !n.is_disconnect());
                        let evicted = match stream {
                            Some(index) => state.items.remove(index),
                            None => state.items.pop_front(),
                        };
                        state.items.push_back(notification);
                        match evicted {
                            Some(evicted) => PushOutcome::DroppedOldest(evicted),
                            None => PushOutcome::Pushed,
                        }
                    }
                }
            }
        };

        self.inner.notify.notify_one();
        outcome
    }

    /// Wait for the next notification. `None` once the queue is closed.
    ///
    /// Cancel safe: a notification is only removed when this resolves.
    pub async fn pop(&self) -> Option<RawNotification> {
        loop {
            {
                let mut state = self.inner.state.lock();
                if state.closed {
                    return None;
                }
                if let Some(notification) = state.items.pop_front() {
                    return Some(notification);
                }
            }
            self.inner.notify.notified().await;
        }
    }

    /// Close the queue, discarding anything not yet consumed.
    pub fn close(&self) {
        let discarded = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            let discarded = state.items.len();
            state.items.clear();
            discarded
        };

        if discarded > 0 {
            debug!(discarded, "Notification queue closed with pending notifications");
        }
        self.inner.notify.notify_one();
    }
}

/// [`Notifiee`] handed to the network layer. Every callback is a non-blocking push.
#[derive(Debug, Clone)]
pub struct NotifyHandle {
    queue: NotifyQueue,
    metrics: DispatchMetrics,
}

impl NotifyHandle {
    pub(crate) fn new(queue: NotifyQueue, metrics: DispatchMetrics) -> Self {
        Self { queue, metrics }
    }

    fn push(&self, notification: RawNotification) {
        let lost = match self.queue.push(notification) {
            PushOutcome::Pushed | PushOutcome::Closed => return,
            PushOutcome::DroppedOldest(evicted) => evicted,
            PushOutcome::DroppedNewest => notification,
        };

        self.metrics.inc_dropped();
        if lost.is_disconnect() {
            self.metrics.inc_dropped_disconnect();
            warn!(peer = %lost.peer(), "Queue full, dropped disconnection");
        } else {
            debug!(peer = %lost.peer(), ?lost, "Queue full, dropped notification");
        }
    }
}

impl Notifiee for NotifyHandle {
    fn disconnected(&self, peer: PeerId) {
        self.push(RawNotification::Disconnected { peer });
    }

    fn stream_opened(&self, peer: PeerId, stream: StreamHandle) {
        self.push(RawNotification::StreamOpened { peer, stream });
    }

    fn stream_closed(&self, peer: PeerId, stream: StreamHandle) {
        self.push(RawNotification::StreamClosed { peer, stream });
    }
}
