//! Buffer configuration for file-backed streams.

/// Reads are issued in multiples of this many bytes.
pub const DEFAULT_BLOCK_SIZE: usize = 512;

pub const DEFAULT_CAPACITY: usize = 4 * DEFAULT_BLOCK_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StreamConfig {
    /// Requested buffer size in bytes; see [`StreamConfig::normalized_capacity`].
    pub capacity: usize,
    pub block_size: usize,
}

impl StreamConfig {
    pub fn with_capacity(capacity: usize) -> Self {
        StreamConfig {
            capacity,
            ..Self::default()
        }
    }

    /// Capacity rounded up to whole blocks, never below two blocks so a
    /// window straddling a block boundary always fits.
    pub fn normalized_capacity(&self) -> usize {
        assert!(self.block_size > 0, "block size must be positive");
        let blocks = self.capacity.div_ceil(self.block_size).max(2);
        blocks * self.block_size
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            capacity: DEFAULT_CAPACITY,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}
