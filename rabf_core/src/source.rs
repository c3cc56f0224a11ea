use std::fs::File;
use std::io::{BufWriter, Write};
use std::os::unix::fs::FileExt;
use std::path::Path;

use crate::Result;

/// Caller-supplied hint threaded through reads and prefetches.
///
/// This layer never interprets it; a data source backed by a quota-aware
/// transport may.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOption {
    pub priority: IoPriority,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IoPriority {
    #[default]
    Normal,
    Low,
}

/// Byte-range-addressable read collaborator backing a compressed file.
///
/// Implementations are shared across session readers, so positional reads
/// take `&self` and must be safe to issue from multiple threads. A source
/// that exposes a stable in-memory base address qualifies the reader for the
/// integrated strategy, which decompresses straight out of that slice.
pub trait DataSource: Send + Sync {
    /// Read up to `buf.len()` bytes at `offset`. A short count means end of
    /// source, never a transient condition.
    fn read_at(&self, buf: &mut [u8], offset: u64, opt: &ReadOption) -> Result<usize>;

    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full resident view of the source, when one exists.
    fn base_address(&self) -> Option<&[u8]> {
        None
    }

    /// Best-effort read-ahead over `[offset, offset + len)`. The default is
    /// a no-op; sources with a real prefetch path may override it.
    fn prefetch(&self, _offset: u64, _len: u64, _opt: &ReadOption) -> Result<()> {
        Ok(())
    }
}

/// Append-only write collaborator the writer flushes compressed blocks into.
pub trait DataSink {
    fn write_all(&mut self, buf: &[u8]) -> Result<()>;

    /// Bytes written so far; the writer records this into the block-address
    /// index after each flushed block.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn flush(&mut self) -> Result<()>;
}

// ── File-backed implementations ────────────────────────────────────────────

/// Plain file source using positional reads; no mapping, so readers on top
/// of it take the buffered (read-then-decompress) path.
pub struct FileSource {
    file: File,
    len: u64,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }
}

impl DataSource for FileSource {
    fn read_at(&self, buf: &mut [u8], offset: u64, _opt: &ReadOption) -> Result<usize> {
        let mut done = 0;
        while done < buf.len() {
            let n = self.file.read_at(&mut buf[done..], offset + done as u64)?;
            if n == 0 {
                break;
            }
            done += n;
        }
        Ok(done)
    }

    fn len(&self) -> u64 {
        self.len
    }
}

/// Memory-mapped file source. Exposes its mapping as the base address, which
/// selects the integrated reader strategy.
pub struct MmapSource {
    mmap: memmap2::Mmap,
}

impl MmapSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        // The file is sealed before readers open it; remapping a file that
        // is still being written is not supported.
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        Ok(Self { mmap })
    }
}

impl DataSource for MmapSource {
    fn read_at(&self, buf: &mut [u8], offset: u64, _opt: &ReadOption) -> Result<usize> {
        let bytes = &self.mmap[..];
        if offset >= bytes.len() as u64 {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(bytes.len() - start);
        buf[..n].copy_from_slice(&bytes[start..start + n]);
        Ok(n)
    }

    fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn base_address(&self) -> Option<&[u8]> {
        Some(&self.mmap)
    }
}

/// Fully resident source over owned bytes. Behaves like `MmapSource` without
/// touching the filesystem; used by tests and by callers that already hold
/// the file contents.
pub struct MemSource {
    bytes: Vec<u8>,
}

impl MemSource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl DataSource for MemSource {
    fn read_at(&self, buf: &mut [u8], offset: u64, _opt: &ReadOption) -> Result<usize> {
        if offset >= self.bytes.len() as u64 {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(self.bytes.len() - start);
        buf[..n].copy_from_slice(&self.bytes[start..start + n]);
        Ok(n)
    }

    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn base_address(&self) -> Option<&[u8]> {
        Some(&self.bytes)
    }
}

/// Buffered append-only file sink tracking its own write position.
pub struct FileSink {
    out: BufWriter<File>,
    len: u64,
}

impl FileSink {
    /// Create (truncating) the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            out: BufWriter::new(file),
            len: 0,
        })
    }
}

impl DataSink for FileSink {
    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.out.write_all(buf)?;
        self.len += buf.len() as u64;
        Ok(())
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}
