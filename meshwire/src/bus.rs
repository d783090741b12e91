//! The message bus: subject routing, request/reply, and leaf-link fan-out.
//!
//! Locking discipline: a single `parking_lot::Mutex` guards routing state
//! (clients, sublist, middleware, leaves). Matching subscribers is done
//! under the lock; the resulting snapshot is delivered to after the lock
//! is released, so handler callbacks never run while the bus mutex is held.

use crate::client::{Client, Delivery, Handler, SubscriberRef};
use crate::error::{BusError, Result};
use crate::inbox;
use crate::middleware::{self, Middleware};
use crate::options::BusOptions;
use bytes::Bytes;
use meshwire_core::sublist::{Sublist, Subscription};
use meshwire_core::subject::validate_filter;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Minimal capability a leaf link exposes to the bus: forward a reply
/// payload to the remote peer when nothing local can answer it.
pub trait LeafSink: Send + Sync {
    fn send_resp(&self, subject: &[u8], payload: &Bytes) -> Result<()>;
}

struct BusInner {
    clients: HashMap<u64, Arc<Client>>,
    sublist: Sublist<SubscriberRef>,
    middleware: Vec<Middleware>,
    leaves: Vec<Arc<dyn LeafSink>>,
}

pub struct Bus {
    inner: Mutex<BusInner>,
    self_client: Arc<Client>,
    next_client_id: AtomicU64,
    options: BusOptions,
}

impl Bus {
    #[must_use]
    pub fn new(options: BusOptions) -> Arc<Self> {
        let self_client = Arc::new(Client::new(0));
        let bus = Arc::new(Self {
            inner: Mutex::new(BusInner {
                clients: HashMap::new(),
                sublist: Sublist::new(),
                middleware: Vec::new(),
                leaves: Vec::new(),
            }),
            self_client,
            next_client_id: AtomicU64::new(1),
            options,
        });
        bus.inner.lock().clients.insert(0, bus.self_client.clone());
        bus
    }

    #[must_use]
    pub fn options(&self) -> &BusOptions {
        &self.options
    }

    pub fn use_middleware(&self, mw: Middleware) {
        self.inner.lock().middleware.push(mw);
    }

    /// Allocate a fresh client id and register it.
    pub fn new_client(&self) -> Arc<Client> {
        let id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        let client = Arc::new(Client::new(id));
        self.inner.lock().clients.insert(id, client.clone());
        client
    }

    pub fn add_client(&self, client: Arc<Client>) {
        debug!(client = client.id(), "client added");
        self.inner.lock().clients.insert(client.id(), client);
    }

    /// Remove a client and all of its subscriptions. Fires `on_unsubscribe`
    /// for each after the bus mutex (and the client mutex) are released.
    pub fn remove_client(&self, client_id: u64) {
        let client = {
            let mut inner = self.inner.lock();
            let Some(client) = inner.clients.remove(&client_id) else {
                debug!(client = client_id, "remove_client on unknown client id");
                return;
            };
            let subjects = client.subjects();
            for subj in &subjects {
                inner.sublist.remove_one(subj, |c| c.client_id == client_id);
            }
            client
        };
        for subj in client.subjects() {
            client.remove_subscription(&subj);
        }
        debug!(client = client_id, "client removed");
    }

    pub fn add_leaf(&self, leaf: Arc<dyn LeafSink>) {
        info!("leaf link registered with bus");
        self.inner.lock().leaves.push(leaf);
    }

    /// Verify a bearer token against the configured secret, if auth is
    /// enabled. A `Bus` with no secret configured accepts every connection.
    pub fn authenticate(&self, token: &str) -> Result<()> {
        let Some(secret) = &self.options.auth_secret else { return Ok(()) };
        meshwire_leaf::auth::verify(secret, token).map(|_claims| ()).map_err(|_| BusError::InvalidToken)
    }

    pub fn publish(&self, subject: &[u8], payload: Bytes) {
        self.deliver_locally(subject, payload, None);
    }

    pub fn publish_with_reply(&self, subject: &[u8], payload: Bytes, reply: &[u8]) {
        self.deliver_locally(subject, payload, Some(reply.into()));
    }

    fn deliver_locally(&self, subject: &[u8], payload: Bytes, reply: Option<Box<[u8]>>) {
        let matches = self.inner.lock().sublist.matches(subject);
        for sub in matches {
            let delivery = Delivery { subject: subject.into(), payload: payload.clone(), reply: reply.clone() };
            (sub.client.handler)(delivery);
        }
    }

    /// Deliver a reply to whoever is waiting on `reply_subject`: a local
    /// inbox subscriber first, then every registered leaf link. Fails with
    /// [`BusError::NoRoute`] if neither path accepted it.
    pub fn respond(&self, reply_subject: &[u8], payload: Bytes) -> Result<()> {
        let matches = self.inner.lock().sublist.matches(reply_subject);
        if !matches.is_empty() {
            for sub in matches {
                let delivery = Delivery { subject: reply_subject.into(), payload: payload.clone(), reply: None };
                (sub.client.handler)(delivery);
            }
            return Ok(());
        }

        let leaves = self.inner.lock().leaves.clone();
        let mut delivered = false;
        for leaf in &leaves {
            if leaf.send_resp(reply_subject, &payload).is_ok() {
                delivered = true;
            }
        }
        if delivered {
            Ok(())
        } else {
            error!(subject = %String::from_utf8_lossy(reply_subject), "no local subscriber or leaf accepted reply");
            Err(BusError::NoRoute)
        }
    }

    /// Publish `payload` on `subject` and await a single reply on a fresh
    /// inbox subject, up to `timeout`.
    pub async fn request(&self, subject: &[u8], payload: Bytes, timeout: Duration) -> Result<Bytes> {
        let inbox_subject = inbox::new_inbox_subject(&self.options.inbox_prefix);
        let (tx, rx) = flume::bounded(1);
        self.subscribe_for_client(
            &self.self_client,
            &inbox_subject,
            b"",
            Arc::new(move |delivery: Delivery| {
                let _ = tx.send(delivery.payload);
            }),
        )?;

        self.deliver_locally(subject, payload, Some(inbox_subject.clone()));

        let result = inbox::await_reply(rx, timeout).await;
        self.unsubscribe(&inbox_subject);
        result
    }

    /// Like [`Self::request`], using `options().request_timeout` as the
    /// deadline instead of an explicit one.
    pub async fn request_default(&self, subject: &[u8], payload: Bytes) -> Result<Bytes> {
        self.request(subject, payload, self.options.request_timeout).await
    }

    pub fn subscribe(&self, subject: &[u8]) -> Result<flume::Receiver<Delivery>> {
        let (tx, rx) = flume::unbounded();
        self.subscribe_with_handler(subject, move |d| {
            let _ = tx.send(d);
        })?;
        Ok(rx)
    }

    pub fn subscribe_with_handler<F>(&self, subject: &[u8], handler: F) -> Result<()>
    where
        F: Fn(Delivery) + Send + Sync + 'static,
    {
        self.subscribe_for_client(&self.self_client, subject, b"", Arc::new(handler))
    }

    pub fn subscribe_with_queue<F>(&self, subject: &[u8], queue: &[u8], handler: F) -> Result<()>
    where
        F: Fn(Delivery) + Send + Sync + 'static,
    {
        self.subscribe_for_client(&self.self_client, subject, queue, Arc::new(handler))
    }

    /// Register `handler` on `client` for `subject`, wrapped by the current
    /// middleware chain. Used directly by leaf links, which own a client
    /// that isn't the bus's own.
    pub fn subscribe_for_client(
        &self,
        client: &Arc<Client>,
        subject: &[u8],
        queue: &[u8],
        handler: Handler,
    ) -> Result<()> {
        validate_filter(subject)?;
        let client_id = client.id();
        let subject_owned = subject.to_vec();
        let chain = self.inner.lock().middleware.clone();
        let wrapped: Handler = Arc::new(move |delivery: Delivery| {
            if middleware::run_chain(&chain, &delivery).is_ok() {
                handler(delivery);
            } else {
                warn!(client = client_id, subject = %String::from_utf8_lossy(&subject_owned), "delivery rejected by middleware");
            }
        });
        client.add_subscription(subject, queue, wrapped.clone());
        let sub = Subscription::new(subject, queue, SubscriberRef { client_id: client.id(), handler: wrapped });
        self.inner.lock().sublist.insert(sub)?;
        debug!(client = client.id(), subject = %String::from_utf8_lossy(subject), "subscribed");
        Ok(())
    }

    /// Remove every matching `Subscription` entry for `subject` from the
    /// sublist. Does not touch any client's own bookkeeping.
    pub fn unsubscribe(&self, subject: &[u8]) {
        debug!(subject = %String::from_utf8_lossy(subject), "unsubscribed");
        self.inner.lock().sublist.remove(subject);
    }

    /// Remove just `client`'s entry for `subject`, used when a leaf link
    /// bridges an inbound `UNSUB` for its own bound client.
    pub fn unsubscribe_client(&self, client: &Arc<Client>, subject: &[u8]) {
        debug!(client = client.id(), subject = %String::from_utf8_lossy(subject), "client unsubscribed");
        self.inner.lock().sublist.remove_one(subject, |c| c.client_id == client.id());
        client.remove_subscription(subject);
    }
}
