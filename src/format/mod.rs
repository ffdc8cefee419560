//! Binary file I/O for .qnms files.

pub mod boib;
pub mod checksum;
pub mod chunk;
pub mod codec;
pub mod compression;
pub mod envelope;
pub mod mmap;
pub mod progress;
pub mod reader;
pub mod schema;
pub mod writer;

pub use boib::{BoiBuffer, Endian, MemoryBuffer, OpenMode, SliceBuffer};
pub use envelope::FileInfo;
pub use mmap::MappedFile;
pub use progress::Progress;
pub use reader::{read_data_block, LoadContext};
pub use schema::{schema_for, Schema, SchemaV1, SchemaV2};
pub use writer::{write_data_block, SaveContext};
