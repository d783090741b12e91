//! A connected subscriber: local embedder callback or bound leaf-link peer.
//!
//! Per-client state (subscriptions, remote-interest set, hooks) is guarded
//! by its own mutex, separate from the Bus mutex. The Bus may acquire a
//! client's mutex while holding its own only during client removal, and it
//! must release the client mutex before invoking any hook.

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// A single inbound message handed to a subscriber callback.
#[derive(Clone)]
pub struct Delivery {
    pub subject: Box<[u8]>,
    pub payload: Bytes,
    pub reply: Option<Box<[u8]>>,
}

pub type Handler = Arc<dyn Fn(Delivery) + Send + Sync>;

/// Called with the bare subject whenever a client gains or loses its first
/// (or last) local interest in it. Leaf links use this to decide when to
/// emit `SUB`/`UNSUB` to the remote peer.
pub type Hook = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Reference stored in `Sublist` entries: enough to identify the owning
/// client for removal and to invoke its (middleware-wrapped) handler.
#[derive(Clone)]
pub struct SubscriberRef {
    pub client_id: u64,
    pub handler: Handler,
}

struct ClientInner {
    subs: BTreeMap<Box<[u8]>, (Box<[u8]>, Handler)>,
    remote_interest: BTreeSet<Box<[u8]>>,
    on_subscribe: Option<Hook>,
    on_unsubscribe: Option<Hook>,
}

pub struct Client {
    id: u64,
    inner: Mutex<ClientInner>,
}

impl Client {
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self {
            id,
            inner: Mutex::new(ClientInner {
                subs: BTreeMap::new(),
                remote_interest: BTreeSet::new(),
                on_subscribe: None,
                on_unsubscribe: None,
            }),
        }
    }

    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    pub fn set_on_subscribe(&self, hook: Hook) {
        self.inner.lock().on_subscribe = Some(hook);
    }

    pub fn set_on_unsubscribe(&self, hook: Hook) {
        self.inner.lock().on_unsubscribe = Some(hook);
    }

    /// Record bookkeeping for a new subscription and fire `on_subscribe`
    /// after releasing the client mutex.
    pub fn add_subscription(&self, subject: &[u8], queue: &[u8], handler: Handler) {
        let hook = {
            let mut inner = self.inner.lock();
            inner.subs.insert(subject.into(), (queue.into(), handler));
            inner.on_subscribe.clone()
        };
        if let Some(hook) = hook {
            hook(subject);
        }
    }

    /// Drop bookkeeping for a subscription and fire `on_unsubscribe` if it
    /// existed, after releasing the client mutex. Returns whether it existed.
    pub fn remove_subscription(&self, subject: &[u8]) -> bool {
        let (existed, hook) = {
            let mut inner = self.inner.lock();
            let existed = inner.subs.remove(subject).is_some();
            (existed, inner.on_unsubscribe.clone())
        };
        if existed {
            if let Some(hook) = hook {
                hook(subject);
            }
        }
        existed
    }

    #[must_use]
    pub fn subjects(&self) -> Vec<Box<[u8]>> {
        self.inner.lock().subs.keys().cloned().collect()
    }

    /// Mark that the remote peer already knows we're interested in `subject`.
    /// Returns `true` if this is new information (no entry existed before).
    pub fn mark_remote_interest(&self, subject: &[u8]) -> bool {
        self.inner.lock().remote_interest.insert(subject.into())
    }

    pub fn clear_remote_interest(&self, subject: &[u8]) -> bool {
        self.inner.lock().remote_interest.remove(subject)
    }

    #[must_use]
    pub fn has_remote_interest(&self, subject: &[u8]) -> bool {
        self.inner.lock().remote_interest.contains(subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn add_subscription_fires_hook_after_unlock() {
        let client = Client::new(1);
        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = fired.clone();
        client.set_on_subscribe(Arc::new(move |_subj| {
            fired2.fetch_add(1, Ordering::SeqCst);
        }));
        client.add_subscription(b"foo.bar", b"", Arc::new(|_| {}));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(client.subjects(), vec![(*b"foo.bar").into()]);
    }

    #[test]
    fn remove_subscription_only_fires_for_existing() {
        let client = Client::new(1);
        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = fired.clone();
        client.set_on_unsubscribe(Arc::new(move |_subj| {
            fired2.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(!client.remove_subscription(b"never.subscribed"));
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        client.add_subscription(b"a.b", b"", Arc::new(|_| {}));
        assert!(client.remove_subscription(b"a.b"));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remote_interest_tracks_first_mark() {
        let client = Client::new(1);
        assert!(client.mark_remote_interest(b"a.b"));
        assert!(!client.mark_remote_interest(b"a.b"));
        assert!(client.has_remote_interest(b"a.b"));
        assert!(client.clear_remote_interest(b"a.b"));
        assert!(!client.has_remote_interest(b"a.b"));
    }
}
