use std::io::{Read, Write};

use crate::CodecError;

/// Zlib backend, shared by the best-compression and default-level variants.
///
/// Decompression is a true streaming inflate: `ZlibDecoder::read_to_end`
/// grows the output as the stream demands, which covers the unknown-final-
/// size case without any guessed bound.
pub(crate) fn compress(
    raw: &[u8],
    level: flate2::Compression,
) -> Result<Vec<u8>, CodecError> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), level);
    encoder.write_all(raw).map_err(|e| CodecError::Compress {
        codec: "zlib",
        detail: e.to_string(),
    })?;
    encoder.finish().map_err(|e| CodecError::Compress {
        codec: "zlib",
        detail: e.to_string(),
    })
}

pub(crate) fn decompress(src: &[u8], raw_len: Option<usize>) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(raw_len.unwrap_or(0));
    let mut decoder = flate2::read::ZlibDecoder::new(src);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CodecError::Decompress {
            codec: "zlib",
            detail: e.to_string(),
        })?;
    Ok(out)
}
