use crate::CodecError;

/// Compression level used for all zstd blocks (zstd's own default).
const LEVEL: i32 = 3;

/// Zstandard backend.
///
/// With a known raw length the bulk one-shot API decodes into an exactly
/// sized buffer. Without one, the streaming decoder is used; the zstd frame
/// is self-terminating so no external bound is needed.
pub(crate) fn compress(raw: &[u8]) -> Result<Vec<u8>, CodecError> {
    zstd::bulk::compress(raw, LEVEL).map_err(|e| CodecError::Compress {
        codec: "zstd",
        detail: e.to_string(),
    })
}

pub(crate) fn decompress(src: &[u8], raw_len: Option<usize>) -> Result<Vec<u8>, CodecError> {
    let res = match raw_len {
        Some(n) => zstd::bulk::decompress(src, n),
        None => zstd::stream::decode_all(src),
    };
    res.map_err(|e| CodecError::Decompress {
        codec: "zstd",
        detail: e.to_string(),
    })
}
