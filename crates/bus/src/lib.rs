//! Typed in-process event bus.
//!
//! The bus is an explicit context object: components receive an [`EventBus`]
//! handle at construction and acquire typed [`Emitter`]s and [`Subscription`]s
//! from it. There is no process-wide singleton, so each component can be tested
//! against its own bus with fake upstreams.
//!
//! # Delivery
//!
//! - Every subscription owns a bounded queue of the bus capacity.
//! - [`Emitter::emit`] waits for queue capacity (backpressure);
//!   [`Emitter::try_emit`] never waits and reports [`BusError::Full`].
//! - Events from one emitter reach a given subscriber in emission order.
//! - When the last emitter of an event type is released, subscriptions of that
//!   type observe end-of-stream.
//! - [`EventBus::close`] ends every subscription and rejects further use.

mod emitter;
mod error;
mod subscription;
mod topic;

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use parking_lot::Mutex;
use tracing::{debug, trace};

pub use emitter::Emitter;
pub use error::{BusError, BusResult};
pub use subscription::Subscription;

use topic::{ErasedTopic, Topic};

/// Default per-subscription queue capacity.
pub const DEFAULT_CAPACITY: usize = 256;

/// Marker for types that can travel over the bus.
pub trait Event: Clone + Send + 'static {}

impl<T: Clone + Send + 'static> Event for T {}

/// Handle to an event bus. Cloning is cheap and yields the same bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    capacity: usize,
    closed: AtomicBool,
    topics: Mutex<HashMap<TypeId, Arc<dyn ErasedTopic>>>,
}

impl core::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.inner.capacity)
            .field("closed", &self.is_closed())
            .field("topics", &self.inner.topics.lock().len())
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    /// Create a bus whose subscriptions buffer up to `capacity` events each.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                capacity: capacity.max(1),
                closed: AtomicBool::new(false),
                topics: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Subscribe to events of type `E`.
    pub fn subscribe<E: Event>(&self) -> BusResult<Subscription<E>> {
        let topic = self.topic::<E>()?;
        let (id, rx) = topic.subscribe(self.inner.capacity)?;
        trace!(event = topic.name(), id, "Subscribed");
        Ok(Subscription::new(id, rx, topic))
    }

    /// Acquire an emitter for events of type `E`.
    pub fn emitter<E: Event>(&self) -> BusResult<Emitter<E>> {
        let topic = self.topic::<E>()?;
        topic.acquire_emitter()?;
        trace!(event = topic.name(), "Emitter acquired");
        Ok(Emitter::new(topic))
    }

    /// Number of live subscriptions for events of type `E`.
    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.existing_topic::<E>()
            .map(|topic| topic.subscriber_count())
            .unwrap_or(0)
    }

    /// Number of live emitters for events of type `E`.
    pub fn emitter_count<E: Event>(&self) -> usize {
        self.existing_topic::<E>()
            .map(|topic| topic.emitter_count())
            .unwrap_or(0)
    }

    /// Close the bus. Every subscription observes end-of-stream and every
    /// subsequent subscribe, emitter or emit call fails with [`BusError::Closed`].
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let topics: Vec<_> = self.inner.topics.lock().drain().map(|(_, t)| t).collect();
        for topic in &topics {
            topic.close();
        }

        debug!(topics = topics.len(), "Event bus closed");
    }

    fn topic<E: Event>(&self) -> BusResult<Arc<Topic<E>>> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }

        let erased = self
            .inner
            .topics
            .lock()
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Arc::new(Topic::<E>::new()) as Arc<dyn ErasedTopic>)
            .clone();

        downcast(erased)
    }

    fn existing_topic<E: Event>(&self) -> Option<Arc<Topic<E>>> {
        let erased = self.inner.topics.lock().get(&TypeId::of::<E>()).cloned()?;
        downcast(erased).ok()
    }
}

fn downcast<E: Event>(erased: Arc<dyn ErasedTopic>) -> BusResult<Arc<Topic<E>>> {
    let any: Arc<dyn Any + Send + Sync> = erased.into_any();
    any.downcast::<Topic<E>>()
        .map_err(|_| BusError::TypeMismatch {
            event: core::any::type_name::<E>(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Ping(u32);

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Pong(u32);

    #[tokio::test]
    async fn test_emit_reaches_every_subscriber_in_order() {
        let bus = EventBus::default();
        let mut a = bus.subscribe::<Ping>().unwrap();
        let mut b = bus.subscribe::<Ping>().unwrap();
        let emitter = bus.emitter::<Ping>().unwrap();

        for i in 0..10 {
            emitter.emit(Ping(i)).await.unwrap();
        }

        for i in 0..10 {
            assert_eq!(a.recv().await, Some(Ping(i)));
            assert_eq!(b.recv().await, Some(Ping(i)));
        }
    }

    #[tokio::test]
    async fn test_topics_are_isolated_by_type() {
        let bus = EventBus::default();
        let mut pings = bus.subscribe::<Ping>().unwrap();
        let mut pongs = bus.subscribe::<Pong>().unwrap();

        let ping = bus.emitter::<Ping>().unwrap();
        let pong = bus.emitter::<Pong>().unwrap();

        pong.emit(Pong(2)).await.unwrap();
        ping.emit(Ping(1)).await.unwrap();

        assert_eq!(pings.recv().await, Some(Ping(1)));
        assert_eq!(pongs.recv().await, Some(Pong(2)));
        assert!(pings.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_last_emitter_release_ends_subscriptions() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe::<Ping>().unwrap();

        let first = bus.emitter::<Ping>().unwrap();
        let second = first.clone();
        assert_eq!(bus.emitter_count::<Ping>(), 2);

        first.close();
        second.emit(Ping(7)).await.unwrap();
        drop(second);

        assert_eq!(bus.emitter_count::<Ping>(), 0);
        assert_eq!(sub.recv().await, Some(Ping(7)));
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn test_try_emit_reports_full() {
        let bus = EventBus::new(1);
        let mut sub = bus.subscribe::<Ping>().unwrap();
        let emitter = bus.emitter::<Ping>().unwrap();

        emitter.try_emit(Ping(1)).unwrap();
        assert_matches!(emitter.try_emit(Ping(2)), Err(BusError::Full { .. }));

        assert_eq!(sub.recv().await, Some(Ping(1)));
        emitter.try_emit(Ping(3)).unwrap();
        assert_eq!(sub.recv().await, Some(Ping(3)));
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_pruned() {
        let bus = EventBus::default();
        let sub = bus.subscribe::<Ping>().unwrap();
        let emitter = bus.emitter::<Ping>().unwrap();
        assert_eq!(bus.subscriber_count::<Ping>(), 1);

        drop(sub);
        assert_eq!(bus.subscriber_count::<Ping>(), 0);

        // Emitting with no subscribers is not an error.
        emitter.emit(Ping(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_close_subscription_deregisters() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe::<Ping>().unwrap();
        let _emitter = bus.emitter::<Ping>().unwrap();

        sub.close();
        assert_eq!(bus.subscriber_count::<Ping>(), 0);
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn test_close_bus() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe::<Ping>().unwrap();
        let emitter = bus.emitter::<Ping>().unwrap();

        bus.close();

        assert_eq!(sub.recv().await, None);
        assert_matches!(emitter.emit(Ping(1)).await, Err(BusError::Closed));
        assert_matches!(emitter.try_emit(Ping(1)), Err(BusError::Closed));
        assert_matches!(bus.subscribe::<Ping>(), Err(BusError::Closed));
        assert_matches!(bus.emitter::<Pong>(), Err(BusError::Closed));
    }

    #[tokio::test]
    async fn test_emit_waits_for_capacity() {
        let bus = EventBus::new(1);
        let mut sub = bus.subscribe::<Ping>().unwrap();
        let emitter = bus.emitter::<Ping>().unwrap();

        emitter.emit(Ping(1)).await.unwrap();

        let pending = tokio::spawn(async move { emitter.emit(Ping(2)).await });
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        assert_eq!(sub.recv().await, Some(Ping(1)));
        pending.await.unwrap().unwrap();
        assert_eq!(sub.recv().await, Some(Ping(2)));
    }

    #[tokio::test]
    async fn test_subscription_is_a_stream() {
        use futures::StreamExt;

        let bus = EventBus::default();
        let sub = bus.subscribe::<Ping>().unwrap();
        let emitter = bus.emitter::<Ping>().unwrap();

        emitter.emit(Ping(1)).await.unwrap();
        emitter.emit(Ping(2)).await.unwrap();
        drop(emitter);

        let received: Vec<_> = sub.collect().await;
        assert_eq!(received, vec![Ping(1), Ping(2)]);
    }
}
