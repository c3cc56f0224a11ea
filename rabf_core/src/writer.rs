use tracing::debug;

use rabf_codecs::Compressor;

use crate::index::BlockAddressIndex;
use crate::source::DataSink;
use crate::{legacy, CompressionInfo, Error, Result};

/// Streaming writer producing a block-compressed file.
///
/// # Write contract
/// Call [`write`](Writer::write) any number of times with arbitrary-sized
/// slices. Raw bytes accumulate in a pending buffer and every full
/// `block_size` bytes are flushed as one independently compressed block:
/// compress, append to the data sink, record
/// `(raw bytes so far, data sink length)` into the block-address index.
/// [`finish`](Writer::finish) flushes the trailing partial block, serializes
/// the index, and returns the sealed [`CompressionInfo`].
///
/// `finish` consumes the writer, so writing after close and double-close are
/// unrepresentable. A writer is exclusively owned by one producer; it is
/// never shared across threads.
///
/// Any sink or codec failure along the way is fatal and propagates — the
/// writer never truncates silently.
pub struct Writer {
    data: Box<dyn DataSink>,
    /// Sibling info sink for the primary two-stream layout; `None` selects
    /// the legacy single-stream trailer.
    info: Option<Box<dyn DataSink>>,
    compressor: Compressor,
    block_size: u64,
    /// Raw bytes not yet flushed into a block.
    pending: Vec<u8>,
    index: BlockAddressIndex,
    /// Raw bytes flushed so far (uncompressed side of the index).
    raw_total: u64,
}

impl std::fmt::Debug for Writer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer")
            .field("block_size", &self.block_size)
            .field("pending", &self.pending.len())
            .field("raw_total", &self.raw_total)
            .finish_non_exhaustive()
    }
}

impl Writer {
    /// Create a two-stream writer: compressed blocks into `data`, the info
    /// record and block-address table into `info` at seal time.
    pub fn new(
        data: Box<dyn DataSink>,
        info: Box<dyn DataSink>,
        compressor_name: &str,
        block_size: u64,
    ) -> Result<Self> {
        let compressor = Compressor::from_name(compressor_name)
            .map_err(|e| Error::BadParameter(e.to_string()))?;
        Self::with_compressor(data, Some(info), compressor, block_size)
    }

    /// Create a legacy single-stream writer. The layout is fixed to snappy
    /// and the index is appended to the data sink itself as a trailer.
    pub fn new_legacy(data: Box<dyn DataSink>, block_size: u64) -> Result<Self> {
        let compressor = Compressor::from_name(legacy::LEGACY_COMPRESSOR)
            .map_err(|e| Error::BadParameter(e.to_string()))?;
        Self::with_compressor(data, None, compressor, block_size)
    }

    fn with_compressor(
        data: Box<dyn DataSink>,
        info: Option<Box<dyn DataSink>>,
        compressor: Compressor,
        block_size: u64,
    ) -> Result<Self> {
        if block_size == 0 {
            return Err(Error::BadParameter("block size must be non-zero".into()));
        }
        Ok(Self {
            data,
            info,
            compressor,
            block_size,
            pending: Vec::with_capacity(block_size.min(8 * 1024 * 1024) as usize),
            index: BlockAddressIndex::new(),
            raw_total: 0,
        })
    }

    pub fn compressor(&self) -> Compressor {
        self.compressor
    }

    /// Buffer `data`, flushing a compressed block for every `block_size`
    /// bytes accumulated. All-or-nothing: on success the whole slice is
    /// accepted.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.pending.extend_from_slice(data);
        while self.pending.len() as u64 >= self.block_size {
            let raw: Vec<u8> = self.pending.drain(..self.block_size as usize).collect();
            self.flush_block(&raw)?;
        }
        Ok(())
    }

    /// Compress one block and append it to the data sink, recording its
    /// boundary in the index. Never called with an empty slice.
    fn flush_block(&mut self, raw: &[u8]) -> Result<()> {
        let compressed = self.compressor.compress_block(raw)?;
        self.data.write_all(&compressed)?;
        self.raw_total += raw.len() as u64;
        if !self.index.add_block(self.raw_total, self.data.len()) {
            // Unreachable while raw is non-empty and the sink only appends.
            return Err(Error::BadParameter(
                "block-address index rejected a non-increasing boundary".into(),
            ));
        }
        Ok(())
    }

    /// Flush the trailing partial block, serialize the index (info stream or
    /// legacy trailer), and seal the file.
    pub fn finish(mut self) -> Result<CompressionInfo> {
        if !self.pending.is_empty() {
            let remaining = std::mem::take(&mut self.pending);
            self.flush_block(&remaining)?;
        }

        let info = CompressionInfo {
            compressor: self.compressor.name().to_string(),
            block_count: self.index.block_count() as u64,
            block_size: self.block_size,
            compressed_file_length: self.data.len(),
            uncompressed_file_length: self.raw_total,
        };

        match self.info.as_mut() {
            Some(info_sink) => {
                let encoded = info.encode(&self.index)?;
                info_sink.write_all(&encoded)?;
                info_sink.flush()?;
            }
            None => {
                legacy::write_trailer(self.data.as_mut(), &self.index, self.block_size)?;
            }
        }
        self.data.flush()?;

        debug!(
            compressor = %info.compressor,
            blocks = info.block_count,
            raw = info.uncompressed_file_length,
            compressed = info.compressed_file_length,
            "sealed block-compressed file"
        );
        Ok(info)
    }
}
