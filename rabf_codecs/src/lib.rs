mod lz4_codec;
mod snappy_codec;
mod zlib_codec;
mod zstd_codec;

/// Upper bound for the guessed output allocation when decompressing an
/// LZ4 block whose raw length is not recorded anywhere.
pub(crate) const MAX_GUESSED_OUTPUT: usize = 64 * 1024 * 1024;

/// Errors raised by the compressor backends.
///
/// Both variants are fatal to the caller: a failed compress aborts the write,
/// a failed decompress means the on-disk bytes are corrupt. Neither is
/// retried anywhere in the stack.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("unknown compressor '{0}'")]
    UnknownCompressor(String),

    #[error("{codec} compress failed: {detail}")]
    Compress { codec: &'static str, detail: String },

    #[error("{codec} decompress failed: {detail}")]
    Decompress { codec: &'static str, detail: String },
}

/// Closed set of block compressors.
///
/// Every block of a RABF file is compressed independently by exactly one of
/// these backends — no cross-block state is permitted, which is the
/// invariant that makes random access possible. The set is fixed, so
/// dispatch is a plain `match` rather than a trait object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compressor {
    /// LZ4 block mode. Fastest decompression of the bundled backends.
    Lz4,
    /// LZ4 high-compression mode. Same decode path as `Lz4`, slower encode
    /// for a better ratio.
    Lz4Hc,
    /// Snappy raw format. The compressed stream carries its own raw-length
    /// prefix, so decompression never needs an external size hint.
    Snappy,
    /// Zlib at best compression.
    Zlib,
    /// Zlib at the library's default level.
    ZlibDefault,
    /// Zstandard at level 3.
    Zstd,
}

impl Compressor {
    /// Resolve a compressor from its registry name.
    ///
    /// This is the name stored in the info stream of every RABF file; an
    /// unknown name there means the file cannot be opened.
    pub fn from_name(name: &str) -> Result<Self, CodecError> {
        match name {
            "lz4" => Ok(Self::Lz4),
            "lz4hc" => Ok(Self::Lz4Hc),
            "snappy" => Ok(Self::Snappy),
            "zlib" => Ok(Self::Zlib),
            "zlib_default" => Ok(Self::ZlibDefault),
            "zstd" => Ok(Self::Zstd),
            other => Err(CodecError::UnknownCompressor(other.to_string())),
        }
    }

    /// Registry name, the exact string `from_name` accepts.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Lz4 => "lz4",
            Self::Lz4Hc => "lz4hc",
            Self::Snappy => "snappy",
            Self::Zlib => "zlib",
            Self::ZlibDefault => "zlib_default",
            Self::Zstd => "zstd",
        }
    }

    /// Compress a single independent block.
    ///
    /// An empty input compresses to an empty output; the writer never flushes
    /// empty blocks, so backends do not treat it specially.
    pub fn compress_block(&self, raw: &[u8]) -> Result<Vec<u8>, CodecError> {
        match self {
            Self::Lz4 => lz4_codec::compress(raw),
            Self::Lz4Hc => lz4_codec::compress_hc(raw),
            Self::Snappy => snappy_codec::compress(raw),
            Self::Zlib => zlib_codec::compress(raw, flate2::Compression::best()),
            Self::ZlibDefault => zlib_codec::compress(raw, flate2::Compression::default()),
            Self::Zstd => zstd_codec::compress(raw),
        }
    }

    /// Decompress a single independent block.
    ///
    /// `raw_len` is the exact decompressed size when the caller knows it
    /// (the primary format records it per block). `None` selects the
    /// unknown-final-size path needed by the legacy trailer format:
    /// LZ4 allocates a guessed bound, snappy recovers the size from its own
    /// length prefix, zlib and zstd stream into a growing buffer.
    pub fn decompress_block(
        &self,
        src: &[u8],
        raw_len: Option<usize>,
    ) -> Result<Vec<u8>, CodecError> {
        match self {
            Self::Lz4 | Self::Lz4Hc => lz4_codec::decompress(src, raw_len),
            Self::Snappy => snappy_codec::decompress(src),
            Self::Zlib | Self::ZlibDefault => zlib_codec::decompress(src, raw_len),
            Self::Zstd => zstd_codec::decompress(src, raw_len),
        }
    }
}
