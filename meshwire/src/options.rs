//! `Bus` construction knobs.

use meshwire_leaf::config::{LeafOptions, DEFAULT_PING_INTERVAL};
use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_INBOX_PREFIX: &str = "_INBOX.";

#[derive(Clone)]
pub struct BusOptions {
    pub request_timeout: Duration,
    pub leaf_options: LeafOptions,
    pub auth_secret: Option<Vec<u8>>,
    pub inbox_prefix: String,
}

impl Default for BusOptions {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            leaf_options: LeafOptions { ping_interval: DEFAULT_PING_INTERVAL, ..LeafOptions::default() },
            auth_secret: None,
            inbox_prefix: DEFAULT_INBOX_PREFIX.to_string(),
        }
    }
}

impl BusOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_leaf_options(mut self, leaf_options: LeafOptions) -> Self {
        self.leaf_options = leaf_options;
        self
    }

    /// Enable JWT bearer auth for incoming leaf links, keyed by `secret`.
    #[must_use]
    pub fn with_auth_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.auth_secret = Some(secret.into());
        self
    }

    /// Override the inbox subject prefix (default `_INBOX.`). Mainly useful
    /// in tests that want deterministic, non-colliding inbox namespaces.
    #[must_use]
    pub fn with_inbox_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.inbox_prefix = prefix.into();
        self
    }
}
