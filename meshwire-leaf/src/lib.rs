//! # Meshwire Leaf
//!
//! **Internal leaf-link wire protocol crate for Meshwire.**
//!
//! This is a sans-IO protocol layer: it decodes and encodes the leaf wire
//! commands (`INFO`, `AUTH`, `SUB`, `UNSUB`, `PUB`, `RESP`, `PING`, `PONG`,
//! `+OK`/`+ACK`/`-ERR`) and verifies JWT bearer tokens, but it does not open
//! sockets or know about a `Bus`. The `meshwire` crate wires this protocol
//! layer to actual TCP connections and bus operations.

#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod codec;
pub mod config;
pub mod error;
pub mod poison;

pub mod prelude {
    pub use crate::auth::Claims;
    pub use crate::codec::{InfoPayload, LeafCodec, LeafCommand};
    pub use crate::config::LeafOptions;
    pub use crate::error::LeafError;
    pub use crate::poison::PoisonGuard;
}
