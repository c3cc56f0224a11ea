//! Legacy single-stream layout.
//!
//! Older attribute-patch files carry no sibling info stream. Instead the
//! data file ends with a trailer, read backward from EOF:
//!
//! ```text
//! [block 0] ... [block N-1]
//! [address table: N x (uncompress_end:u64, compress_end:u64)]
//! [block_size:u64]
//! [block_count:u64]
//! ```
//!
//! The trailer records no compressor name; this layout is fixed to snappy.
//! The byte layout is genuinely different from the primary info stream, so
//! the decode paths are kept separate on purpose.

use crate::format::ENTRY_SIZE;
use crate::index::BlockAddressIndex;
use crate::source::{DataSink, DataSource, ReadOption};
use crate::{CompressionInfo, Error, Result};

/// The only compressor the legacy layout supports.
pub const LEGACY_COMPRESSOR: &str = "snappy";

/// Append the legacy trailer to a data sink that already holds all
/// compressed blocks.
pub fn write_trailer(
    sink: &mut dyn DataSink,
    index: &BlockAddressIndex,
    block_size: u64,
) -> Result<()> {
    for entry in index.entries() {
        sink.write_all(&entry.uncompress_end.to_le_bytes())?;
        sink.write_all(&entry.compress_end.to_le_bytes())?;
    }
    sink.write_all(&block_size.to_le_bytes())?;
    sink.write_all(&(index.block_count() as u64).to_le_bytes())?;
    Ok(())
}

/// Parse the trailer of a legacy file, walking backward from EOF.
///
/// Each backward step checks that enough bytes remain in front of the
/// cursor; running out means the file is truncated or not a legacy file at
/// all, which is fatal corruption.
pub fn parse_trailer(source: &dyn DataSource) -> Result<(CompressionInfo, BlockAddressIndex)> {
    let opt = ReadOption::default();
    let file_len = source.len();

    let mut cursor = file_len;
    let block_count = read_u64_before(source, &mut cursor, &opt)?;
    let block_size = read_u64_before(source, &mut cursor, &opt)?;

    let table_bytes = block_count
        .checked_mul(ENTRY_SIZE as u64)
        .filter(|&n| n <= cursor)
        .ok_or_else(|| {
            Error::Corrupt(format!(
                "legacy trailer claims {block_count} blocks but only {cursor} bytes precede it"
            ))
        })?;
    cursor -= table_bytes;

    let mut table = vec![0u8; table_bytes as usize];
    let n = source.read_at(&mut table, cursor, &opt)?;
    if n != table.len() {
        return Err(Error::Corrupt(format!(
            "short read of legacy address table: wanted {} bytes, got {n}",
            table.len()
        )));
    }

    let mut index = BlockAddressIndex::with_capacity(block_count as usize);
    for entry in table.chunks_exact(ENTRY_SIZE) {
        let uncompress_end = u64::from_le_bytes(entry[..8].try_into().unwrap());
        let compress_end = u64::from_le_bytes(entry[8..].try_into().unwrap());
        if !index.add_block(uncompress_end, compress_end) {
            return Err(Error::Corrupt(format!(
                "legacy address table is not strictly increasing at entry {}",
                index.block_count()
            )));
        }
    }

    // The compressed blocks occupy exactly the bytes in front of the table.
    if index.compressed_length() != cursor {
        return Err(Error::Corrupt(format!(
            "legacy table ends blocks at byte {} but the data region is {} bytes",
            index.compressed_length(),
            cursor
        )));
    }
    if block_count > 0 && block_size == 0 {
        return Err(Error::Corrupt(
            "legacy trailer has blocks but a zero block size".into(),
        ));
    }

    let info = CompressionInfo {
        compressor: LEGACY_COMPRESSOR.to_string(),
        block_count,
        block_size,
        compressed_file_length: index.compressed_length(),
        uncompressed_file_length: index.uncompressed_length(),
    };
    Ok((info, index))
}

/// Read the u64 immediately preceding `*cursor`, moving the cursor back.
fn read_u64_before(source: &dyn DataSource, cursor: &mut u64, opt: &ReadOption) -> Result<u64> {
    let pos = cursor.checked_sub(8).ok_or_else(|| {
        Error::Corrupt("legacy file is too short to hold its trailer".into())
    })?;
    let mut buf = [0u8; 8];
    let n = source.read_at(&mut buf, pos, opt)?;
    if n != 8 {
        return Err(Error::Corrupt("short read inside the legacy trailer".into()));
    }
    *cursor = pos;
    Ok(u64::from_le_bytes(buf))
}
