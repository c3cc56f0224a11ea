/// Error taxonomy of the block-compressed file layer.
///
/// Everything here is fatal to the operation that raised it. The layer never
/// retries I/O and never degrades silently; the single documented soft
/// fallback (cache-backed reads downgrading to buffered reads on a block-size
/// mismatch) is logged, not raised.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration caught at construction time: unknown compressor
    /// name, zero block size, non-monotonic index append.
    #[error("bad parameter: {0}")]
    BadParameter(String),

    /// An underlying read or write failed outright.
    #[error("file i/o failed")]
    Io(#[from] std::io::Error),

    /// A compressor backend rejected its input. On the write side this
    /// aborts the file; on the read side it means on-disk corruption.
    #[error("codec failure")]
    Codec(#[from] rabf_codecs::CodecError),

    /// On-disk state is internally inconsistent: trailer fields that do not
    /// fit the file length, short reads against recorded block lengths,
    /// checksum mismatches, decompressed sizes disagreeing with the index.
    #[error("corrupt file: {0}")]
    Corrupt(String),

    /// The operation is not meaningful for this reader variant.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
