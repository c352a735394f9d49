//! Per-type subscriber registry.

use std::{any::Any, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use crate::{BusError, BusResult, Event};

/// Type-erased view of a topic, used for bus-wide operations.
pub(crate) trait ErasedTopic: Send + Sync {
    fn close(&self);
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

pub(crate) struct Topic<E> {
    name: &'static str,
    state: Mutex<TopicState<E>>,
}

struct TopicState<E> {
    subscribers: Vec<(u64, mpsc::Sender<E>)>,
    emitters: usize,
    next_id: u64,
    closed: bool,
}

impl<E: Event> Topic<E> {
    pub(crate) fn new() -> Self {
        Self {
            name: core::any::type_name::<E>(),
            state: Mutex::new(TopicState {
                subscribers: Vec::new(),
                emitters: 0,
                next_id: 0,
                closed: false,
            }),
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn subscribe(&self, capacity: usize) -> BusResult<(u64, mpsc::Receiver<E>)> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(BusError::Closed);
        }

        let (tx, rx) = mpsc::channel(capacity);
        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.push((id, tx));
        Ok((id, rx))
    }

    pub(crate) fn unsubscribe(&self, id: u64) {
        let mut state = self.state.lock();
        let before = state.subscribers.len();
        state.subscribers.retain(|(sid, _)| *sid != id);
        if state.subscribers.len() != before {
            trace!(event = self.name, id, "Subscription released");
        }
    }

    pub(crate) fn acquire_emitter(&self) -> BusResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(BusError::Closed);
        }
        state.emitters += 1;
        Ok(())
    }

    /// Count another handle to an already acquired emitter.
    pub(crate) fn retain_emitter(&self) {
        self.state.lock().emitters += 1;
    }

    /// Release one emitter. Releasing the last one ends all current subscriptions.
    pub(crate) fn release_emitter(&self) {
        let mut state = self.state.lock();
        state.emitters = state.emitters.saturating_sub(1);
        if state.emitters == 0 && !state.subscribers.is_empty() {
            trace!(
                event = self.name,
                subscribers = state.subscribers.len(),
                "Last emitter released, ending subscriptions"
            );
            state.subscribers.clear();
        }
    }

    /// Snapshot of live subscriber queues.
    pub(crate) fn senders(&self) -> BusResult<Vec<(u64, mpsc::Sender<E>)>> {
        let state = self.state.lock();
        if state.closed {
            return Err(BusError::Closed);
        }
        Ok(state.subscribers.clone())
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    pub(crate) fn emitter_count(&self) -> usize {
        self.state.lock().emitters
    }
}

impl<E: Event> ErasedTopic for Topic<E> {
    fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.subscribers.clear();
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
