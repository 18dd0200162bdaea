/// Per-transfer chunk tracking using a compact bitfield.
///
/// Sized once from the transfer's chunk count and never reallocated. The
/// sender uses one to track acknowledged chunks, the receiver one to track
/// received chunks.

/// Compact bitfield recording which sequence numbers have been seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkBitfield {
    bits: Box<[u64]>,
    total: u32,
    set_count: u32,
}

impl ChunkBitfield {
    /// Create an empty bitfield for a transfer of `total` chunks.
    pub fn new(total: u32) -> Self {
        let words = (total as usize).div_ceil(64);
        Self {
            bits: vec![0u64; words].into_boxed_slice(),
            total,
            set_count: 0,
        }
    }

    /// Mark a sequence as seen. Returns true if it was newly set, false for
    /// duplicates and out-of-range sequences.
    #[inline]
    pub fn set(&mut self, sequence: u32) -> bool {
        if sequence >= self.total {
            return false;
        }
        let idx = sequence as usize;
        let mask = 1u64 << (idx % 64);
        let word = &mut self.bits[idx / 64];
        if *word & mask != 0 {
            return false;
        }
        *word |= mask;
        self.set_count += 1;
        true
    }

    /// Check whether a sequence has been seen.
    #[inline]
    pub fn get(&self, sequence: u32) -> bool {
        if sequence >= self.total {
            return false;
        }
        let idx = sequence as usize;
        self.bits[idx / 64] & (1u64 << (idx % 64)) != 0
    }

    /// Returns true once every sequence has been seen.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.set_count == self.total
    }

    /// Number of sequences seen.
    #[inline]
    pub fn count(&self) -> u32 {
        self.set_count
    }

    #[inline]
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Collect every sequence not yet seen, ascending.
    pub fn missing(&self) -> Vec<u32> {
        (0..self.total).filter(|&seq| !self.get(seq)).collect()
    }
}
