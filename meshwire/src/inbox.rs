//! Request/reply plumbing: a `_INBOX.<random>` subject backing a single-shot
//! channel, torn down on both the success and timeout paths.

use crate::error::BusError;
use bytes::Bytes;
use compio::time::timeout;
use std::time::Duration;

/// Generate a fresh, unguessable inbox subject under `prefix`.
#[must_use]
pub fn new_inbox_subject(prefix: &str) -> Box<[u8]> {
    let token: u64 = rand::random();
    format!("{prefix}{token}").into_bytes().into_boxed_slice()
}

/// Wait for a single reply on `rx`, racing against `deadline`.
pub async fn await_reply(rx: flume::Receiver<Bytes>, deadline: Duration) -> Result<Bytes, BusError> {
    match timeout(deadline, rx.recv_async()).await {
        Ok(Ok(reply)) => Ok(reply),
        Ok(Err(_)) | Err(_) => Err(BusError::RequestTimeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbox_subjects_are_unique_and_prefixed() {
        let a = new_inbox_subject("_INBOX.");
        let b = new_inbox_subject("_INBOX.");
        assert_ne!(a, b);
        assert!(a.starts_with(b"_INBOX."));
    }
}
