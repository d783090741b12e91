//! # Meshwire
//!
//! An embeddable, subject-based publish/subscribe message bus with
//! request/reply semantics and TCP leaf-link federation.
//!
//! ## Architecture
//!
//! Meshwire is layered the way a messaging kernel is layered:
//!
//! - **`meshwire-core`**: the subject-matching engine (adaptive radix tree,
//!   Sublist, Subject Transform) — no I/O, no bus concepts.
//! - **`meshwire-leaf`**: the leaf-link wire protocol, sans-IO — framing,
//!   JWT auth, buffer/ping configuration. No sockets, no `Bus`.
//! - **`meshwire`** (this crate): the `Bus` itself, plus the TCP-owning
//!   `LeafLink` that bridges the protocol crate to live connections.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use meshwire::{Bus, BusOptions};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = Bus::new(BusOptions::new());
//!
//! bus.subscribe_with_handler(b"echo", {
//!     let bus = bus.clone();
//!     move |delivery| {
//!         if let Some(reply) = delivery.reply {
//!             let _ = bus.respond(&reply, delivery.payload);
//!         }
//!     }
//! })?;
//!
//! let reply = bus.request(b"echo", Bytes::from_static(b"ping"), Duration::from_secs(1)).await?;
//! assert_eq!(&reply[..], b"ping");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::future_not_send)] // Runtime-agnostic design
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

pub use bytes::Bytes;

mod bus;
mod client;
mod inbox;
mod io_buf;
mod link;
mod middleware;
mod options;

pub mod error;

pub use bus::{Bus, LeafSink};
pub use client::{Client, Delivery, Handler, Hook, SubscriberRef};
pub use error::BusError;
pub use link::LeafLink;
pub use middleware::Middleware;
pub use options::BusOptions;

/// Development helpers (benches/tests).
pub mod dev_tracing;
