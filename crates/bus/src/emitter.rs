//! Typed event emitters.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tracing::trace;

use crate::{BusError, BusResult, Event, topic::Topic};

/// Publishes events of type `E` to every live subscription.
///
/// Cloning an emitter registers another emitter with the bus; the topic's
/// subscriptions end once every clone has been closed or dropped.
pub struct Emitter<E: Event> {
    topic: Arc<Topic<E>>,
}

impl<E: Event> Emitter<E> {
    pub(crate) fn new(topic: Arc<Topic<E>>) -> Self {
        Self { topic }
    }

    /// Deliver `event` to every subscriber, waiting for queue capacity.
    pub async fn emit(&self, event: E) -> BusResult<()> {
        for (id, tx) in self.topic.senders()? {
            if tx.send(event.clone()).await.is_err() {
                self.topic.unsubscribe(id);
            }
        }
        Ok(())
    }

    /// Deliver `event` without waiting.
    ///
    /// Subscribers with a full queue miss the event and [`BusError::Full`] is
    /// returned; every other subscriber still receives it.
    pub fn try_emit(&self, event: E) -> BusResult<()> {
        let mut full = false;
        for (id, tx) in self.topic.senders()? {
            match tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    trace!(event = self.topic.name(), id, "Subscriber queue full");
                    full = true;
                }
                Err(TrySendError::Closed(_)) => self.topic.unsubscribe(id),
            }
        }

        if full {
            Err(BusError::Full {
                event: self.topic.name(),
            })
        } else {
            Ok(())
        }
    }

    /// Release this emitter.
    pub fn close(self) {
        drop(self);
    }
}

impl<E: Event> Clone for Emitter<E> {
    fn clone(&self) -> Self {
        self.topic.retain_emitter();
        Self {
            topic: self.topic.clone(),
        }
    }
}

impl<E: Event> Drop for Emitter<E> {
    fn drop(&mut self) {
        self.topic.release_emitter();
    }
}

impl<E: Event> core::fmt::Debug for Emitter<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Emitter")
            .field("event", &self.topic.name())
            .finish()
    }
}
