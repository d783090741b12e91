//! Buffer and timing knobs for a leaf link.

use std::time::Duration;

pub const DEFAULT_READ_BUF_SIZE: usize = 8 * 1024;
pub const DEFAULT_WRITE_BUF_SIZE: usize = 8 * 1024;

/// Ping cadence mandated by the wire protocol: every 30 seconds.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
pub struct LeafOptions {
    pub read_buffer_size: usize,
    pub write_buffer_size: usize,
    pub ping_interval: Duration,
}

impl Default for LeafOptions {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUF_SIZE,
            write_buffer_size: DEFAULT_WRITE_BUF_SIZE,
            ping_interval: DEFAULT_PING_INTERVAL,
        }
    }
}

impl LeafOptions {
    #[must_use]
    pub fn small() -> Self {
        Self { read_buffer_size: 1024, write_buffer_size: 1024, ..Self::default() }
    }

    #[must_use]
    pub fn large() -> Self {
        Self { read_buffer_size: 64 * 1024, write_buffer_size: 64 * 1024, ..Self::default() }
    }

    #[must_use]
    pub fn custom(read_buffer_size: usize, write_buffer_size: usize) -> Self {
        Self { read_buffer_size, write_buffer_size, ..Self::default() }
    }

    #[must_use]
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }
}
