//! Live reload notification
//!
//! A [`ReloadNotifier`] keeps a registry of subscribers, each with its own
//! bounded queue. [`ReloadNotifier::notify_changed`] invalidates the changed
//! template in every attached [`TemplateCache`] and then offers a
//! [`ReloadEvent::Reload`] to every subscriber without waiting: a full queue
//! drops the event for that subscriber only, a closed queue removes the
//! subscriber.
//!
//! Transports live in submodules: [`sse`] serves subscriptions as a
//! Server-Sent Events stream and [`script`] builds the browser side.

pub mod script;
pub mod sse;

use crate::cache::TemplateCache;
use futures_util::Stream;
use std::collections::BTreeMap;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Default per-subscriber queue capacity
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

static GLOBAL: OnceLock<Arc<ReloadNotifier>> = OnceLock::new();

/// Event delivered to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadEvent {
    Reload,
}

impl ReloadEvent {
    /// Wire name of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            ReloadEvent::Reload => "reload",
        }
    }
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers that received the event
    pub delivered: usize,
    /// Subscribers whose queue was full
    pub dropped: usize,
    /// Subscribers removed because their receiver was gone
    pub pruned: usize,
}

#[derive(Debug, Default)]
struct Registry {
    next_id: u64,
    subscribers: BTreeMap<u64, mpsc::Sender<ReloadEvent>>,
}

type SharedRegistry = Arc<Mutex<Registry>>;

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Fan-out of reload events to live-reload clients
#[derive(Debug)]
pub struct ReloadNotifier {
    registry: SharedRegistry,
    caches: Mutex<Vec<Weak<TemplateCache>>>,
    capacity: usize,
}

impl ReloadNotifier {
    /// Notifier whose subscribers each buffer up to `capacity` events
    pub fn new(capacity: usize) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            caches: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    /// Process-wide notifier, created on first use
    pub fn global() -> Arc<ReloadNotifier> {
        Self::init_global(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Process-wide notifier; `capacity` only applies if this call creates it
    pub fn init_global(capacity: usize) -> Arc<ReloadNotifier> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(ReloadNotifier::new(capacity))))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Register a new subscriber
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.subscribers.insert(id, sender);
        debug!(id, subscribers = registry.subscribers.len(), "reload subscriber added");
        Subscription {
            id,
            receiver,
            registry: Arc::downgrade(&self.registry),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.registry).subscribers.len()
    }

    /// Invalidate entries of `cache` on every [`notify_changed`](Self::notify_changed)
    ///
    /// The notifier holds the cache weakly; attaching the same cache twice
    /// has no effect.
    pub fn attach_cache(&self, cache: &Arc<TemplateCache>) {
        let mut caches = self.caches.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        caches.retain(|weak| weak.strong_count() > 0);
        let weak = Arc::downgrade(cache);
        if !caches.iter().any(|attached| attached.ptr_eq(&weak)) {
            caches.push(weak);
        }
    }

    /// Invalidate `path` in attached caches, then broadcast a reload
    pub fn notify_changed(&self, path: &Path) -> BroadcastReport {
        let caches: Vec<Arc<TemplateCache>> = {
            let caches = self.caches.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            caches.iter().filter_map(Weak::upgrade).collect()
        };
        for cache in &caches {
            cache.invalidate(path);
        }
        debug!(path = %path.display(), caches = caches.len(), "template changed");
        self.broadcast(ReloadEvent::Reload)
    }

    /// Offer `event` to every subscriber without blocking
    pub fn broadcast(&self, event: ReloadEvent) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut registry = lock(&self.registry);
        registry.subscribers.retain(|id, sender| match sender.try_send(event) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(id, "reload subscriber queue full; event dropped");
                report.dropped += 1;
                true
            }
            Err(TrySendError::Closed(_)) => {
                report.pruned += 1;
                false
            }
        });
        debug!(
            event = event.as_str(),
            delivered = report.delivered,
            dropped = report.dropped,
            pruned = report.pruned,
            "reload broadcast"
        );
        report
    }
}

impl Default for ReloadNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

/// A live-reload client's end of the notifier
///
/// Dropping the subscription unregisters it.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    receiver: mpsc::Receiver<ReloadEvent>,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next event; `None` once the notifier is gone
    pub async fn recv(&mut self) -> Option<ReloadEvent> {
        self.receiver.recv().await
    }

    /// Next buffered event, if any
    pub fn try_recv(&mut self) -> Option<ReloadEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = ReloadEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).subscribers.remove(&self.id);
            debug!(id = self.id, "reload subscriber removed");
        }
    }
}
