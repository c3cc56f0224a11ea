pub mod cache;
pub mod error;
pub mod format;
pub mod index;
pub mod legacy;
pub mod reader;
pub mod source;
pub mod writer;

pub use cache::{BlockCache, BlockKey, LruBlockCache};
pub use error::{Error, Result};
pub use format::{CompressionInfo, INFO_FIXED_SIZE, MAGIC};
pub use index::{BlockAddress, BlockAddressIndex};
pub use rabf_codecs::{CodecError, Compressor};
pub use reader::{Reader, ReaderOptions, Strategy};
pub use source::{
    DataSink, DataSource, FileSink, FileSource, IoPriority, MemSource, MmapSource, ReadOption,
};
pub use writer::Writer;
