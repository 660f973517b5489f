//! Typed async topic bus
//!
//! This crate provides the TopicBus, the in-process pub/sub primitive the
//! bridge uses to fan inbound messages out to the reconciler and to live
//! entities. Topics are typed keys, not formatted strings.
//!
//! Delivery happens in the publisher's task: `publish` awaits every current
//! subscriber in subscription order before returning. Nothing is queued or
//! replayed; a subscriber registered after a publish never sees it.

use dashmap::DashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, trace};

/// Future returned by a topic handler
pub type TopicFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Type-erased topic handler
pub type TopicHandler<P> = Arc<dyn Fn(P) -> TopicFuture + Send + Sync>;

/// A unique identifier for a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Subscribers<K, P> = DashMap<K, Vec<(ListenerId, TopicHandler<P>)>>;

/// Publish/subscribe bus keyed by a typed topic `K` carrying payload `P`
pub struct TopicBus<K, P> {
    /// Subscribers per topic, in subscription order
    subscribers: Arc<Subscribers<K, P>>,
    /// Counter for generating unique listener IDs
    next_listener_id: AtomicU64,
}

impl<K, P> TopicBus<K, P>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    P: Clone + Send + 'static,
{
    /// Create a new, empty bus
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(DashMap::new()),
            next_listener_id: AtomicU64::new(1),
        }
    }

    /// Subscribe an async handler to a topic
    ///
    /// Returns the handle that removes exactly this subscription.
    pub fn subscribe<F, Fut>(&self, topic: K, handler: F) -> Unsubscribe
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::SeqCst));
        trace!(topic = ?topic, listener = id.0, "Subscribing to topic");

        let handler: TopicHandler<P> =
            Arc::new(move |payload| Box::pin(handler(payload)) as TopicFuture);
        self.subscribers
            .entry(topic.clone())
            .or_default()
            .push((id, handler));

        let subscribers: Weak<Subscribers<K, P>> = Arc::downgrade(&self.subscribers);
        Unsubscribe::new(move || {
            let Some(subscribers) = subscribers.upgrade() else {
                return;
            };
            let now_empty = match subscribers.get_mut(&topic) {
                Some(mut list) => {
                    list.retain(|(listener, _)| *listener != id);
                    list.is_empty()
                }
                None => false,
            };
            if now_empty {
                subscribers.remove_if(&topic, |_, list| list.is_empty());
            }
            trace!(topic = ?topic, listener = id.0, "Unsubscribed from topic");
        })
    }

    /// Publish a payload to every current subscriber of a topic
    ///
    /// Handlers run one after another in subscription order. The subscriber
    /// list is snapshotted first, so handlers may subscribe or unsubscribe
    /// on this bus without deadlocking. Returns the number of handlers run.
    pub async fn publish(&self, topic: &K, payload: P) -> usize {
        let handlers: Vec<TopicHandler<P>> = match self.subscribers.get(topic) {
            Some(list) => list.iter().map(|(_, handler)| handler.clone()).collect(),
            None => Vec::new(),
        };

        debug!(topic = ?topic, subscribers = handlers.len(), "Publishing to topic");

        for handler in &handlers {
            handler(payload.clone()).await;
        }
        handlers.len()
    }

    /// Number of subscribers currently registered for a topic
    pub fn subscriber_count(&self, topic: &K) -> usize {
        self.subscribers
            .get(topic)
            .map(|list| list.len())
            .unwrap_or_default()
    }

    /// Number of topics with at least one subscriber
    pub fn topic_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<K, P> Default for TopicBus<K, P>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    P: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Disposal handle for a subscription
///
/// Calling [`Unsubscribe::cancel`] removes the subscription; later calls do
/// nothing. Dropping the handle without cancelling leaves the subscription
/// in place.
pub struct Unsubscribe {
    cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Unsubscribe {
    fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Mutex::new(Some(Box::new(cancel))),
        }
    }

    /// Remove the subscription this handle was returned for
    pub fn cancel(&self) {
        let cancel = self
            .cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    /// Whether the subscription has already been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }
}

impl Debug for Unsubscribe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Thread-safe wrapper for TopicBus
pub type SharedTopicBus<K, P> = Arc<TopicBus<K, P>>;
