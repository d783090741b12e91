//! Core error types.
//!
//! Covers failures from the Subject Tree, Sublist and Subject Transform.
//! Transport and bus-level failures live in the `meshwire-leaf` and
//! `meshwire` crates respectively, which wrap these variants via `#[from]`.

use thiserror::Error;

pub use crate::subject::SubjectError;
pub use crate::transform::TransformError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid subject: {0}")]
    Subject(#[from] SubjectError),

    #[error("invalid subject transform: {0}")]
    Transform(#[from] TransformError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
