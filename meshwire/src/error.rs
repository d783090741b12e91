//! Top-level Bus error type.
//!
//! Carries the three wire-exposed codes from the external interface
//! (`INVALID_TOKEN`, `REQUEST_TIMEOUT`, `NO_ROUTE`) as distinguishable
//! variants so callers can match on them without parsing strings.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BusError {
    /// 401 - authentication failed. Never exposes which claim was at fault.
    #[error("invalid token")]
    InvalidToken,

    /// 408 - `request` exceeded its deadline.
    #[error("request timed out")]
    RequestTimeout,

    /// 404 - `respond` found neither a local subscriber nor a leaf.
    #[error("no route")]
    NoRoute,

    #[error("invalid subject: {0}")]
    Subject(#[from] meshwire_core::subject::SubjectError),

    #[error("invalid subject transform: {0}")]
    Transform(#[from] meshwire_core::transform::TransformError),

    #[error("leaf link error: {0}")]
    Leaf(#[from] meshwire_leaf::error::LeafError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, BusError>;

impl BusError {
    #[must_use]
    pub const fn code(&self) -> Option<u16> {
        match self {
            Self::InvalidToken => Some(401),
            Self::RequestTimeout => Some(408),
            Self::NoRoute => Some(404),
            _ => None,
        }
    }
}
