use xxhash_rust::xxh3::xxh3_64;

use crate::index::BlockAddressIndex;
use crate::{Error, Result};

/// Magic bytes opening the RABF info stream.
pub const MAGIC: &[u8; 8] = b"RABF1\n\x00\x00";

/// Fixed prefix of the info stream in bytes.
///   magic[8] + version:u16 + name_len:u16 + reserved:u32
///   + block_size:u64 + block_count:u64
///   + compressed_file_length:u64 + uncompressed_file_length:u64
///   = 8 + 2 + 2 + 4 + 8 + 8 + 8 + 8 = 48
pub const INFO_FIXED_SIZE: usize = 48;

/// Size of each serialized block-address entry:
/// uncompress_end:u64 + compress_end:u64.
pub const ENTRY_SIZE: usize = 16;

/// Trailing xxh3-64 guarding the whole info stream.
const CHECKSUM_SIZE: usize = 8;

const VERSION: u16 = 1;

/// Per-file compression metadata.
///
/// Built once by the writer at seal time, loaded once by the reader at open
/// time, immutable in between and after. Shared read-only across every
/// session reader of the same file.
#[derive(Debug, Clone)]
pub struct CompressionInfo {
    /// Registry name of the compressor used for every block in the file.
    pub compressor: String,
    pub block_count: u64,
    /// Nominal uncompressed bytes per block; the last block may be smaller.
    pub block_size: u64,
    pub compressed_file_length: u64,
    pub uncompressed_file_length: u64,
}

impl CompressionInfo {
    /// Serialize the info record plus the block-address table into the info
    /// stream layout: fixed record, compressor name, `block_count` 16-byte
    /// entries, trailing xxh3-64 of everything preceding.
    pub fn encode(&self, index: &BlockAddressIndex) -> Result<Vec<u8>> {
        if self.compressor.len() > u16::MAX as usize {
            return Err(Error::BadParameter(format!(
                "compressor name of {} bytes does not fit the info record",
                self.compressor.len()
            )));
        }
        let table_bytes = index.block_count() * ENTRY_SIZE;
        let mut buf =
            Vec::with_capacity(INFO_FIXED_SIZE + self.compressor.len() + table_bytes + CHECKSUM_SIZE);
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&VERSION.to_le_bytes());
        buf.extend_from_slice(&(self.compressor.len() as u16).to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes()); // reserved
        buf.extend_from_slice(&self.block_size.to_le_bytes());
        buf.extend_from_slice(&self.block_count.to_le_bytes());
        buf.extend_from_slice(&self.compressed_file_length.to_le_bytes());
        buf.extend_from_slice(&self.uncompressed_file_length.to_le_bytes());
        buf.extend_from_slice(self.compressor.as_bytes());
        for entry in index.entries() {
            buf.extend_from_slice(&entry.uncompress_end.to_le_bytes());
            buf.extend_from_slice(&entry.compress_end.to_le_bytes());
        }
        let checksum = xxh3_64(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        Ok(buf)
    }

    /// Decode an info stream back into the info record and address table.
    ///
    /// Every structural field is cross-checked: magic, version, declared
    /// lengths against the stream size, table monotonicity, the totals
    /// against the table's last entry, and the trailing checksum. Any
    /// disagreement means the stream is corrupt.
    pub fn decode(buf: &[u8]) -> Result<(Self, BlockAddressIndex)> {
        if buf.len() < INFO_FIXED_SIZE + CHECKSUM_SIZE {
            return Err(Error::Corrupt(format!(
                "info stream of {} bytes is shorter than the fixed record",
                buf.len()
            )));
        }
        if &buf[..8] != MAGIC {
            return Err(Error::Corrupt("bad magic, not a RABF info stream".into()));
        }
        let version = u16::from_le_bytes(buf[8..10].try_into().unwrap());
        if version != VERSION {
            return Err(Error::Corrupt(format!(
                "unsupported info stream version {version}"
            )));
        }
        let name_len = u16::from_le_bytes(buf[10..12].try_into().unwrap()) as usize;
        let block_size = u64::from_le_bytes(buf[16..24].try_into().unwrap());
        let block_count = u64::from_le_bytes(buf[24..32].try_into().unwrap());
        let compressed_file_length = u64::from_le_bytes(buf[32..40].try_into().unwrap());
        let uncompressed_file_length = u64::from_le_bytes(buf[40..48].try_into().unwrap());

        let table_bytes = (block_count as usize)
            .checked_mul(ENTRY_SIZE)
            .ok_or_else(|| Error::Corrupt("block count overflows the table size".into()))?;
        let expected = INFO_FIXED_SIZE + name_len + table_bytes + CHECKSUM_SIZE;
        if buf.len() != expected {
            return Err(Error::Corrupt(format!(
                "info stream is {} bytes, layout requires {}",
                buf.len(),
                expected
            )));
        }

        let body = &buf[..expected - CHECKSUM_SIZE];
        let stored = u64::from_le_bytes(buf[expected - CHECKSUM_SIZE..].try_into().unwrap());
        let computed = xxh3_64(body);
        if stored != computed {
            return Err(Error::Corrupt(format!(
                "info stream checksum mismatch: stored {stored:016x}, computed {computed:016x}"
            )));
        }

        let compressor = std::str::from_utf8(&buf[INFO_FIXED_SIZE..INFO_FIXED_SIZE + name_len])
            .map_err(|_| Error::Corrupt("compressor name is not utf-8".into()))?
            .to_string();

        let mut index = BlockAddressIndex::with_capacity(block_count as usize);
        let table = &buf[INFO_FIXED_SIZE + name_len..expected - CHECKSUM_SIZE];
        for entry in table.chunks_exact(ENTRY_SIZE) {
            let uncompress_end = u64::from_le_bytes(entry[..8].try_into().unwrap());
            let compress_end = u64::from_le_bytes(entry[8..].try_into().unwrap());
            if !index.add_block(uncompress_end, compress_end) {
                return Err(Error::Corrupt(format!(
                    "block-address table is not strictly increasing at entry {}",
                    index.block_count()
                )));
            }
        }

        if index.uncompressed_length() != uncompressed_file_length {
            return Err(Error::Corrupt(format!(
                "uncompressed length {} disagrees with the address table's {}",
                uncompressed_file_length,
                index.uncompressed_length()
            )));
        }
        if index.compressed_length() != compressed_file_length {
            return Err(Error::Corrupt(format!(
                "compressed length {} disagrees with the address table's {}",
                compressed_file_length,
                index.compressed_length()
            )));
        }

        Ok((
            Self {
                compressor,
                block_count,
                block_size,
                compressed_file_length,
                uncompressed_file_length,
            },
            index,
        ))
    }
}
