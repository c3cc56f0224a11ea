use crate::{CodecError, MAX_GUESSED_OUTPUT};

/// LZ4 block backend.
///
/// Blocks are raw LZ4 block streams with no length prefix — the surrounding
/// format records the exact raw length per block, so prepending it here
/// would duplicate state. The HC variant only changes the encoder; HC output
/// is a standard LZ4 block and shares the same decode path.
pub(crate) fn compress(raw: &[u8]) -> Result<Vec<u8>, CodecError> {
    Ok(lz4_flex::block::compress(raw))
}

pub(crate) fn compress_hc(raw: &[u8]) -> Result<Vec<u8>, CodecError> {
    lz4::block::compress(
        raw,
        Some(lz4::block::CompressionMode::HIGHCOMPRESSION(9)),
        false,
    )
    .map_err(|e| CodecError::Compress {
        codec: "lz4hc",
        detail: e.to_string(),
    })
}

pub(crate) fn decompress(src: &[u8], raw_len: Option<usize>) -> Result<Vec<u8>, CodecError> {
    // Without a recorded raw length the output bound is guessed from the
    // maximum LZ4 expansion ratio, capped at 64 MiB.
    let bound = match raw_len {
        Some(n) => n,
        None => src.len().saturating_mul(256).min(MAX_GUESSED_OUTPUT),
    };
    lz4_flex::block::decompress(src, bound).map_err(|e| CodecError::Decompress {
        codec: "lz4",
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hc_output_decodes_on_plain_path() {
        let raw: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let hc = compress_hc(&raw).unwrap();
        assert_eq!(decompress(&hc, Some(raw.len())).unwrap(), raw);
        assert_eq!(decompress(&hc, None).unwrap(), raw);
    }

    #[test]
    fn hc_is_no_larger_than_fast_on_repetitive_input() {
        let raw = vec![7u8; 32 * 1024];
        let fast = compress(&raw).unwrap();
        let hc = compress_hc(&raw).unwrap();
        assert!(hc.len() <= fast.len());
    }
}
