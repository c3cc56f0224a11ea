use std::sync::Arc;

use tracing::{debug, warn};

use rabf_codecs::Compressor;

use crate::cache::{BlockCache, BlockKey};
use crate::index::BlockAddressIndex;
use crate::source::{DataSource, ReadOption};
use crate::{legacy, CompressionInfo, Error, Result};

/// How a reader materializes decompressed blocks. Chosen once at open time,
/// immutable for the reader's lifetime.
pub enum Strategy {
    /// The source is fully memory-resident; decompress straight out of its
    /// base address with no intermediate read.
    Integrated,
    /// Positional read of the compressed block into a scratch buffer, then
    /// decompress.
    Buffered,
    /// Like `Buffered`, but decompressed blocks are shared through a
    /// process-wide cache keyed by `(file_id, block)`.
    CacheBacked {
        cache: Arc<dyn BlockCache>,
        file_id: u64,
    },
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Integrated => "integrated",
            Self::Buffered => "buffered",
            Self::CacheBacked { .. } => "cache-backed",
        }
    }
}

impl Clone for Strategy {
    fn clone(&self) -> Self {
        match self {
            Self::Integrated => Self::Integrated,
            Self::Buffered => Self::Buffered,
            Self::CacheBacked { cache, file_id } => Self::CacheBacked {
                cache: Arc::clone(cache),
                file_id: *file_id,
            },
        }
    }
}

/// Open-time knobs for the strategy choice.
#[derive(Default)]
pub struct ReaderOptions {
    /// Shared block cache; used only when its block size matches the file's.
    pub cache: Option<Arc<dyn BlockCache>>,
    /// Identity of the backing file inside the shared cache keyspace.
    pub file_id: u64,
}

/// Random-access reader over a block-compressed file.
///
/// Presents `read(buf, offset)` as if the file were stored uncompressed,
/// decompressing only the blocks a read actually touches. The decompressed
/// bytes of the most recently touched block are kept; consecutive reads
/// inside one block cost a single decompression.
///
/// The compression info and block-address index are immutable and shared:
/// [`session`](Reader::session) clones a reader for another thread, reusing
/// them while giving the clone its own cursor and buffers. One reader
/// instance is single-threaded; concurrency means many session readers.
pub struct Reader {
    source: Arc<dyn DataSource>,
    info: Arc<CompressionInfo>,
    index: Arc<BlockAddressIndex>,
    compressor: Compressor,
    /// Legacy single-stream files predate per-call size hints, so their
    /// blocks decode through the unknown-final-size codec path.
    legacy: bool,
    strategy: Strategy,
    /// Block whose decompressed bytes `block` holds; `block_count` (one past
    /// the last block) means nothing is loaded.
    current_block: usize,
    block: Vec<u8>,
    /// Compressed scratch for the buffered path, sized once at open to the
    /// largest compressed block.
    scratch: Vec<u8>,
    /// Cursor for sequential reads.
    cursor: u64,
    /// Number of block loads since open; test instrumentation.
    loads: u64,
}

impl Reader {
    /// Open a reader over a primary two-stream file whose info stream has
    /// already been decoded.
    pub fn open(
        source: Arc<dyn DataSource>,
        info: CompressionInfo,
        index: BlockAddressIndex,
        opts: ReaderOptions,
    ) -> Result<Self> {
        Self::build(source, Arc::new(info), Arc::new(index), opts, false)
    }

    /// Open a reader over a legacy single-stream file, parsing its trailer
    /// backward from EOF. The compressor is the layout's fixed snappy.
    pub fn open_legacy(source: Arc<dyn DataSource>, opts: ReaderOptions) -> Result<Self> {
        let (info, index) = legacy::parse_trailer(source.as_ref())?;
        Self::build(source, Arc::new(info), Arc::new(index), opts, true)
    }

    fn build(
        source: Arc<dyn DataSource>,
        info: Arc<CompressionInfo>,
        index: Arc<BlockAddressIndex>,
        opts: ReaderOptions,
        legacy: bool,
    ) -> Result<Self> {
        let compressor = Compressor::from_name(&info.compressor)
            .map_err(|e| Error::BadParameter(e.to_string()))?;
        if info.block_size == 0 && info.block_count > 0 {
            return Err(Error::BadParameter(
                "compression info has blocks but a zero block size".into(),
            ));
        }
        if info.block_count != index.block_count() as u64 {
            return Err(Error::Corrupt(format!(
                "info declares {} blocks, address table has {}",
                info.block_count,
                index.block_count()
            )));
        }
        if info.uncompressed_file_length != index.uncompressed_length()
            || info.compressed_file_length != index.compressed_length()
        {
            return Err(Error::Corrupt(
                "compression info totals disagree with the address table".into(),
            ));
        }
        if source.len() < info.compressed_file_length {
            return Err(Error::Corrupt(format!(
                "data source holds {} bytes, blocks require {}",
                source.len(),
                info.compressed_file_length
            )));
        }

        let strategy = if source.base_address().is_some() {
            Strategy::Integrated
        } else if let Some(cache) = opts.cache {
            if cache.block_size() == info.block_size {
                Strategy::CacheBacked {
                    cache,
                    file_id: opts.file_id,
                }
            } else {
                // Soft fallback, not an error: the file stays readable, the
                // cache just cannot hold its blocks.
                warn!(
                    cache_block_size = cache.block_size(),
                    file_block_size = info.block_size,
                    "block cache size mismatch, falling back to buffered reads"
                );
                Strategy::Buffered
            }
        } else {
            Strategy::Buffered
        };

        let scratch = match strategy {
            Strategy::Integrated => Vec::new(),
            _ => vec![0u8; index.max_compressed_block_size() as usize],
        };

        debug!(
            compressor = %info.compressor,
            blocks = info.block_count,
            strategy = strategy.name(),
            legacy,
            "opened block-compressed reader"
        );

        Ok(Self {
            source,
            current_block: index.block_count(),
            info,
            index,
            compressor,
            legacy,
            strategy,
            block: Vec::new(),
            scratch,
            cursor: 0,
            loads: 0,
        })
    }

    #[inline]
    pub fn uncompressed_len(&self) -> u64 {
        self.info.uncompressed_file_length
    }

    pub fn info(&self) -> &CompressionInfo {
        &self.info
    }

    pub fn index(&self) -> &BlockAddressIndex {
        &self.index
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Blocks loaded (decompressed or fetched from the cache) since open.
    pub fn blocks_loaded(&self) -> u64 {
        self.loads
    }

    /// Independent reader over the same file for another consumer: shares
    /// the immutable source/info/index (and cache), owns fresh cursor and
    /// buffer state.
    pub fn session(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            info: Arc::clone(&self.info),
            index: Arc::clone(&self.index),
            compressor: self.compressor,
            legacy: self.legacy,
            strategy: self.strategy.clone(),
            current_block: self.index.block_count(),
            block: Vec::new(),
            scratch: vec![0u8; self.scratch.len()],
            cursor: 0,
            loads: 0,
        }
    }

    /// Absolute read: fill `buf` from uncompressed offset `offset`.
    ///
    /// Returns the bytes copied — short only when the request runs past end
    /// of file, and `Ok(0)` at or beyond it. EOF is a normal outcome, never
    /// an error.
    pub fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.read_at_opt(buf, offset, &ReadOption::default())
    }

    pub fn read_at_opt(
        &mut self,
        buf: &mut [u8],
        offset: u64,
        opt: &ReadOption,
    ) -> Result<usize> {
        if offset >= self.info.uncompressed_file_length {
            return Ok(0);
        }
        self.cursor = offset;
        self.read_opt(buf, opt)
    }

    /// Sequential read from the current cursor.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.read_opt(buf, &ReadOption::default())
    }

    pub fn read_opt(&mut self, buf: &mut [u8], opt: &ReadOption) -> Result<usize> {
        let total = self.info.uncompressed_file_length;
        let mut copied = 0;
        while copied < buf.len() && self.cursor < total {
            let block = self.index.block_index_of(self.cursor)?;
            if block != self.current_block {
                self.load_block(block, opt)?;
            }
            let in_block = self.index.in_block_offset(self.cursor, block) as usize;
            let n = (self.block.len() - in_block).min(buf.len() - copied);
            buf[copied..copied + n].copy_from_slice(&self.block[in_block..in_block + n]);
            copied += n;
            self.cursor += n as u64;
        }
        Ok(copied)
    }

    /// Convenience wrapper allocating the result of an absolute read.
    pub fn read_range(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let n = self.read_at(&mut buf, offset)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Best-effort read-ahead hint for `[offset, offset + len)`, rounded to
    /// block boundaries and forwarded to the source as a compressed byte
    /// span. No-op when the source is already memory-resident.
    pub fn prefetch(&self, offset: u64, len: u64) -> Result<()> {
        self.prefetch_opt(offset, len, &ReadOption::default())
    }

    pub fn prefetch_opt(&self, offset: u64, len: u64, opt: &ReadOption) -> Result<()> {
        if matches!(self.strategy, Strategy::Integrated) {
            return Ok(());
        }
        let total = self.info.uncompressed_file_length;
        if len == 0 || offset >= total {
            return Ok(());
        }
        let end = offset.saturating_add(len).min(total);
        let first = self.index.block_index_of(offset)?;
        let last = self.index.block_index_of(end - 1)?;
        let start = self.index.compressed_block_address(first);
        let span = self.index.entries()[last].compress_end - start;
        self.source.prefetch(start, span, opt)
    }

    /// Make `block` the current decompressed block, by whichever path the
    /// strategy prescribes.
    fn load_block(&mut self, block: usize, opt: &ReadOption) -> Result<()> {
        let raw_len = self.index.raw_block_length(block) as usize;
        let size_hint = if self.legacy { None } else { Some(raw_len) };

        let cache_slot = match &self.strategy {
            Strategy::CacheBacked { cache, file_id } => Some((
                Arc::clone(cache),
                BlockKey {
                    file_id: *file_id,
                    block: block as u64,
                },
            )),
            _ => None,
        };

        let bytes = if matches!(self.strategy, Strategy::Integrated) {
            let base = self
                .source
                .base_address()
                .ok_or(Error::Unsupported("integrated read without a base address"))?;
            let start = self.index.compressed_block_address(block) as usize;
            let len = self.index.compressed_block_length(block) as usize;
            if start + len > base.len() {
                return Err(Error::Corrupt(format!(
                    "block {block} claims bytes {}..{} past the mapped {} bytes",
                    start,
                    start + len,
                    base.len()
                )));
            }
            self.compressor
                .decompress_block(&base[start..start + len], size_hint)?
        } else if let Some((cache, key)) = &cache_slot {
            match cache.get(key) {
                Some(hit) => hit.to_vec(),
                None => {
                    let raw = self.fetch_and_decompress(block, size_hint, opt)?;
                    cache.put(*key, Arc::from(raw.as_slice()));
                    raw
                }
            }
        } else {
            self.fetch_and_decompress(block, size_hint, opt)?
        };

        if bytes.len() != raw_len {
            return Err(Error::Corrupt(format!(
                "block {block} decompressed to {} bytes, address table says {raw_len}",
                bytes.len()
            )));
        }
        self.block = bytes;
        self.current_block = block;
        self.loads += 1;
        Ok(())
    }

    /// Buffered path: length-checked positional read of the compressed
    /// block into the scratch buffer, then decompress.
    fn fetch_and_decompress(
        &mut self,
        block: usize,
        size_hint: Option<usize>,
        opt: &ReadOption,
    ) -> Result<Vec<u8>> {
        let offset = self.index.compressed_block_address(block);
        let len = self.index.compressed_block_length(block) as usize;
        if self.scratch.len() < len {
            self.scratch.resize(len, 0);
        }
        let n = self.source.read_at(&mut self.scratch[..len], offset, opt)?;
        if n != len {
            return Err(Error::Corrupt(format!(
                "short read of block {block}: wanted {len} compressed bytes, got {n}"
            )));
        }
        Ok(self
            .compressor
            .decompress_block(&self.scratch[..len], size_hint)?)
    }
}
