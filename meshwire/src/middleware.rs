//! Publish-path middleware: functions run, in insertion order, before a
//! matched subscriber's handler is invoked. The first error halts the
//! chain and the handler is not called for that delivery.

use crate::client::Delivery;
use crate::error::BusError;
use std::sync::Arc;

pub type Middleware = Arc<dyn Fn(&Delivery) -> Result<(), BusError> + Send + Sync>;

/// Run `chain` in order against `delivery`, stopping at the first error.
pub fn run_chain(chain: &[Middleware], delivery: &Delivery) -> Result<(), BusError> {
    for mw in chain {
        mw(delivery)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn delivery() -> Delivery {
        Delivery { subject: (*b"a.b").into(), payload: Bytes::from_static(b"x"), reply: None }
    }

    #[test]
    fn empty_chain_passes() {
        assert!(run_chain(&[], &delivery()).is_ok());
    }

    #[test]
    fn first_error_halts_chain() {
        let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let calls2 = calls.clone();
        let first: Middleware = Arc::new(move |_d| {
            calls2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(BusError::NoRoute)
        });
        let calls3 = calls.clone();
        let second: Middleware = Arc::new(move |_d| {
            calls3.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        });
        let result = run_chain(&[first, second], &delivery());
        assert!(result.is_err());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
