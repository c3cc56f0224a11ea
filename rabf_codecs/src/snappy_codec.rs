use crate::CodecError;

/// Snappy raw-format backend.
///
/// The raw snappy stream begins with a varint of the decompressed length,
/// so the exact output size is always recoverable from the compressed bytes
/// themselves — no size hint or guessed bound is ever needed. This is the
/// backend the legacy single-stream trailer format is fixed to.
pub(crate) fn compress(raw: &[u8]) -> Result<Vec<u8>, CodecError> {
    snap::raw::Encoder::new()
        .compress_vec(raw)
        .map_err(|e| CodecError::Compress {
            codec: "snappy",
            detail: e.to_string(),
        })
}

pub(crate) fn decompress(src: &[u8]) -> Result<Vec<u8>, CodecError> {
    snap::raw::Decoder::new()
        .decompress_vec(src)
        .map_err(|e| CodecError::Decompress {
            codec: "snappy",
            detail: e.to_string(),
        })
}
