//! Event Broadcaster
//!
//! Fans block events out to a dynamic set of live subscribers.
//!
//! Every subscriber owns a bounded channel. What happens when a
//! subscriber's buffer is full is decided by [`OverflowPolicy`]:
//!
//! - [`OverflowPolicy::Drop`] (default): delivery is a non-blocking
//!   `try_send` made while holding the registry lock. A full buffer
//!   drops the event for that subscriber only and bumps its drop counter.
//! - [`OverflowPolicy::Block`]: senders are cloned under the lock and the
//!   lock is released before delivering. Each send waits at most
//!   `timeout`; a send that times out counts as a drop. A send still
//!   waiting when its subscriber unsubscribes is abandoned.
//!
//! Either way a slow consumer can delay a publish by at most one timeout
//! and never stalls `subscribe`/`unsubscribe`.

use crate::domain::entities::BlockEvent;
use futures::Stream;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::sync::mpsc::error::{SendTimeoutError, TryRecvError, TrySendError};

/// Default number of events buffered per subscriber.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 10;

/// Identifier handed out by [`EventBroadcaster::subscribe`].
pub type SubscriberId = u64;

/// What to do when a subscriber's buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Drop the event for that subscriber and count it.
    #[default]
    Drop,
    /// Wait up to `timeout` for room, then drop and count.
    Block { timeout: Duration },
}

/// Broadcaster configuration.
#[derive(Debug, Clone)]
pub struct BroadcasterConfig {
    /// Buffered events per subscriber (at least 1)
    pub capacity: usize,
    pub overflow: OverflowPolicy,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_SUBSCRIBER_CAPACITY,
            overflow: OverflowPolicy::Drop,
        }
    }
}

/// Outcome of a single publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// Fired once when a subscriber leaves the registry.
#[derive(Default)]
struct CloseSignal {
    closed: AtomicBool,
    notify: Notify,
}

impl CloseSignal {
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    async fn wait(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        notified.await;
    }
}

struct SubscriberSlot {
    sender: mpsc::Sender<BlockEvent>,
    dropped: Arc<AtomicU64>,
    closed: Arc<CloseSignal>,
}

struct Registry {
    subscribers: Mutex<HashMap<SubscriberId, SubscriberSlot>>,
    next_id: AtomicU64,
    dropped_total: AtomicU64,
}

impl Registry {
    fn remove(&self, id: SubscriberId) -> bool {
        match self.subscribers.lock().remove(&id) {
            Some(slot) => {
                slot.closed.close();
                true
            }
            None => false,
        }
    }

    fn record_drop(&self, id: SubscriberId, dropped: &AtomicU64) {
        dropped.fetch_add(1, Ordering::Relaxed);
        self.dropped_total.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(subscriber = id, "subscriber buffer full, block event dropped");
    }
}

/// Publish/subscribe hub for block events.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct EventBroadcaster {
    registry: Arc<Registry>,
    config: BroadcasterConfig,
}

impl EventBroadcaster {
    pub fn new(config: BroadcasterConfig) -> Self {
        Self {
            registry: Arc::new(Registry {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                dropped_total: AtomicU64::new(0),
            }),
            config,
        }
    }

    /// Register a new subscriber.
    ///
    /// The subscription unsubscribes itself when dropped, so a client
    /// that disconnects releases its channel without extra bookkeeping.
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.config.capacity.max(1));
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let dropped = Arc::new(AtomicU64::new(0));

        self.registry.subscribers.lock().insert(
            id,
            SubscriberSlot {
                sender,
                dropped: dropped.clone(),
                closed: Arc::new(CloseSignal::default()),
            },
        );
        tracing::debug!(subscriber = id, "subscriber registered");

        Subscription {
            id,
            receiver,
            dropped,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Remove a subscriber and close its channel.
    ///
    /// Returns `false` if the id was not registered (already
    /// unsubscribed, or never existed).
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.registry.remove(id);
        if removed {
            tracing::debug!(subscriber = id, "subscriber unsubscribed");
        }
        removed
    }

    /// Deliver `event` to every registered subscriber.
    pub async fn publish(&self, event: BlockEvent) -> PublishReport {
        let report = match self.config.overflow {
            OverflowPolicy::Drop => self.publish_nonblocking(&event),
            OverflowPolicy::Block { timeout } => self.publish_bounded(&event, timeout).await,
        };

        tracing::debug!(
            ip = %event.ip,
            delivered = report.delivered,
            dropped = report.dropped,
            "block event published"
        );
        report
    }

    fn publish_nonblocking(&self, event: &BlockEvent) -> PublishReport {
        let mut report = PublishReport::default();
        let registry = &self.registry;

        registry.subscribers.lock().retain(|id, slot| {
            match slot.sender.try_send(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    registry.record_drop(*id, &slot.dropped);
                    report.dropped += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(subscriber = *id, "pruning closed subscriber");
                    return false;
                }
            }
            true
        });

        report
    }

    async fn publish_bounded(&self, event: &BlockEvent, timeout: Duration) -> PublishReport {
        let targets: Vec<_> = self
            .registry
            .subscribers
            .lock()
            .iter()
            .map(|(id, slot)| {
                (
                    *id,
                    slot.sender.clone(),
                    slot.dropped.clone(),
                    slot.closed.clone(),
                )
            })
            .collect();

        let sends = targets.into_iter().map(|(id, sender, dropped, closed)| {
            let event = event.clone();
            async move {
                let outcome = tokio::select! {
                    biased;
                    _ = closed.wait() => None,
                    sent = sender.send_timeout(event, timeout) => Some(sent),
                };
                (id, dropped, outcome)
            }
        });
        let outcomes = futures::future::join_all(sends).await;

        let mut report = PublishReport::default();
        for (id, dropped, outcome) in outcomes {
            match outcome {
                None => {
                    tracing::debug!(subscriber = id, "unsubscribed while waiting, send abandoned");
                }
                Some(Ok(())) => report.delivered += 1,
                Some(Err(SendTimeoutError::Timeout(_))) => {
                    self.registry.record_drop(id, &dropped);
                    report.dropped += 1;
                }
                Some(Err(SendTimeoutError::Closed(_))) => {
                    self.registry.remove(id);
                }
            }
        }
        report
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.registry.subscribers.lock().len()
    }

    /// Events dropped across all subscribers since start.
    pub fn dropped_total(&self) -> u64 {
        self.registry.dropped_total.load(Ordering::Relaxed)
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(BroadcasterConfig::default())
    }
}

/// Receiving end of a subscription.
///
/// Yields `None` once the subscriber has been unsubscribed and the
/// buffered events are drained.
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<BlockEvent>,
    dropped: Arc<AtomicU64>,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next event.
    pub async fn recv(&mut self) -> Option<BlockEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Result<BlockEvent, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Events dropped for this subscriber because its buffer was full.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Stream for Subscription {
    type Item = BlockEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<BlockEvent>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if registry.remove(self.id) {
                tracing::debug!(subscriber = self.id, "subscriber released");
            }
        }
    }
}
