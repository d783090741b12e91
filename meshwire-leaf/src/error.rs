//! Leaf-link protocol error types.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LeafError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("peer closed the connection")]
    Closed,

    #[error("invalid subject in wire frame: {0}")]
    Subject(#[from] meshwire_core::subject::SubjectError),

    #[error("invalid subject transform: {0}")]
    Transform(#[from] meshwire_core::transform::TransformError),
}

pub type Result<T> = std::result::Result<T, LeafError>;

impl LeafError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Closed)
    }
}
