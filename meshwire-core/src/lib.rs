//! Meshwire Core
//!
//! Runtime-agnostic subject-matching kernel:
//! - Adaptive radix tree over subject byte strings (`tree`)
//! - Subscription index layered on top of it (`sublist`)
//! - Subject rewrite templates for leaf-link federation (`transform`)
//! - Shared token rules for subjects and filters (`subject`)
//! - Zero-copy segmented buffer used by the leaf wire decoder (`buffer`)
//! - Error types (`error`)

#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod buffer;
pub mod error;
pub mod sublist;
pub mod subject;
pub mod transform;
pub mod tree;

pub mod prelude {
    pub use crate::buffer::SegmentedBuffer;
    pub use crate::error::CoreError;
    pub use crate::sublist::{Sublist, Subscription};
    pub use crate::subject::{validate_filter, validate_subject, RESERVED_BYTE};
    pub use crate::transform::SubjectTransform;
    pub use crate::tree::SubjectTree;
}
