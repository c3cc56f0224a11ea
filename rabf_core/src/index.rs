/// One block boundary: where the block ends in the uncompressed logical file
/// and where its compressed bytes end in the data stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockAddress {
    pub uncompress_end: u64,
    pub compress_end: u64,
}

/// Ordered table mapping block index to its byte ranges on both sides of the
/// compressor.
///
/// Both coordinates are strictly increasing across entries. Block `i` covers
/// uncompressed bytes `[uncompress_end[i-1], uncompress_end[i])` (with an
/// implicit 0 before the first entry) and compressed bytes
/// `[compress_end[i-1], compress_end[i])` in the data stream — so block
/// lengths are never stored, only derived.
#[derive(Debug, Clone, Default)]
pub struct BlockAddressIndex {
    entries: Vec<BlockAddress>,
}

impl BlockAddressIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(blocks: usize) -> Self {
        Self {
            entries: Vec::with_capacity(blocks),
        }
    }

    /// Append one block boundary.
    ///
    /// Returns `false` without mutating the table if either coordinate fails
    /// to strictly increase over the previous entry. That is a construction
    /// bug in the producer, not a recoverable runtime condition.
    #[must_use]
    pub fn add_block(&mut self, uncompress_end: u64, compress_end: u64) -> bool {
        if let Some(last) = self.entries.last() {
            if uncompress_end <= last.uncompress_end || compress_end <= last.compress_end {
                return false;
            }
        } else if uncompress_end == 0 || compress_end == 0 {
            // The first entry must also advance past the implicit origin.
            return false;
        }
        self.entries.push(BlockAddress {
            uncompress_end,
            compress_end,
        });
        true
    }

    #[inline]
    pub fn block_count(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[BlockAddress] {
        &self.entries
    }

    /// Total uncompressed length covered by the table (0 when empty).
    pub fn uncompressed_length(&self) -> u64 {
        self.entries.last().map_or(0, |e| e.uncompress_end)
    }

    /// Total compressed length covered by the table (0 when empty).
    pub fn compressed_length(&self) -> u64 {
        self.entries.last().map_or(0, |e| e.compress_end)
    }

    /// Index of the block containing uncompressed `offset`: the first entry
    /// whose `uncompress_end` exceeds it.
    ///
    /// Callers guard `offset < uncompressed_length()`; past-the-end offsets
    /// are a caller bug and reported as corruption rather than panicking.
    pub fn block_index_of(&self, offset: u64) -> crate::Result<usize> {
        let idx = self.entries.partition_point(|e| e.uncompress_end <= offset);
        if idx == self.entries.len() {
            return Err(crate::Error::Corrupt(format!(
                "offset {} is past the uncompressed length {}",
                offset,
                self.uncompressed_length()
            )));
        }
        Ok(idx)
    }

    /// Uncompressed offset at which `block` starts.
    #[inline]
    pub fn block_start(&self, block: usize) -> u64 {
        if block == 0 {
            0
        } else {
            self.entries[block - 1].uncompress_end
        }
    }

    /// Offset of `offset` within `block`.
    #[inline]
    pub fn in_block_offset(&self, offset: u64, block: usize) -> u64 {
        offset - self.block_start(block)
    }

    /// Uncompressed length of `block`.
    #[inline]
    pub fn raw_block_length(&self, block: usize) -> u64 {
        self.entries[block].uncompress_end - self.block_start(block)
    }

    /// Byte offset of `block`'s compressed bytes in the data stream.
    #[inline]
    pub fn compressed_block_address(&self, block: usize) -> u64 {
        if block == 0 {
            0
        } else {
            self.entries[block - 1].compress_end
        }
    }

    /// Length of `block`'s compressed bytes in the data stream.
    #[inline]
    pub fn compressed_block_length(&self, block: usize) -> u64 {
        self.entries[block].compress_end - self.compressed_block_address(block)
    }

    /// Largest per-block compressed length in the table.
    ///
    /// Computed once at reader open to size the decompression scratch buffer,
    /// so no read ever reallocates it.
    pub fn max_compressed_block_size(&self) -> u64 {
        (0..self.entries.len())
            .map(|i| self.compressed_block_length(i))
            .max()
            .unwrap_or(0)
    }
}
