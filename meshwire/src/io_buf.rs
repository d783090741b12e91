//! Zero-copy `IoBuf` wrapper for writing a `Bytes` buffer through compio's
//! ownership-passing I/O traits without an extra `to_vec()` copy.

#![allow(unsafe_code)]

use bytes::Bytes;

pub struct IoBytes(Bytes);

impl IoBytes {
    pub const fn new(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Bytes> for IoBytes {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

// SAFETY: Bytes is immutable and refcounted, so exposing its pointer/len as
// an IoBuf is sound: the buffer stays valid and unaliased for the duration
// of the completion-based write.
unsafe impl compio::buf::IoBuf for IoBytes {
    #[inline]
    fn as_buf_ptr(&self) -> *const u8 {
        self.0.as_ptr()
    }

    #[inline]
    fn buf_len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    fn buf_capacity(&self) -> usize {
        self.0.len()
    }
}
