//! Typed event subscriptions.

use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures::Stream;
use tokio::sync::mpsc;

use crate::{Event, topic::Topic};

/// Receives events of type `E` in emission order.
///
/// Dropping or [closing](Self::close) the subscription deregisters it from the
/// bus immediately.
pub struct Subscription<E: Event> {
    id: u64,
    rx: mpsc::Receiver<E>,
    topic: Arc<Topic<E>>,
}

impl<E: Event> Subscription<E> {
    pub(crate) fn new(id: u64, rx: mpsc::Receiver<E>, topic: Arc<Topic<E>>) -> Self {
        Self { id, rx, topic }
    }

    /// Receive the next event. Returns `None` at end-of-stream.
    pub async fn recv(&mut self) -> Option<E> {
        self.rx.recv().await
    }

    /// Receive an already queued event without waiting.
    pub fn try_recv(&mut self) -> Option<E> {
        self.rx.try_recv().ok()
    }

    /// Deregister from the bus. Events already queued can still be received.
    pub fn close(&mut self) {
        self.topic.unsubscribe(self.id);
        self.rx.close();
    }
}

impl<E: Event> Stream for Subscription<E> {
    type Item = E;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<E>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl<E: Event> Drop for Subscription<E> {
    fn drop(&mut self) {
        self.topic.unsubscribe(self.id);
    }
}

impl<E: Event> core::fmt::Debug for Subscription<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.topic.name())
            .field("id", &self.id)
            .finish()
    }
}
