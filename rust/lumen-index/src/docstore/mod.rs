//! Document store: the paired data/index files backing retrieval by document id.
//!
//! The data file is a concatenation of per-document records:
//!
//! ```text
//! [C32 field_count] { [C32 name_len] [name bytes] [value] }*
//! ```
//!
//! Fields appear in ascending byte order of their names. Only fields declared as
//! stored are written. Values carry no type tag; their width comes from the field's
//! declared [`PrimitiveType`](crate::PrimitiveType): text and blobs as a C32 length
//! plus raw bytes, `int32` as C32, `int64` as C64, floats as fixed-width big-endian.
//!
//! The index file holds one big-endian `u64` per document id, in id order, giving
//! the byte offset of that document's record in the data file. Neither file has a
//! header.

mod reader;
mod writer;

pub use reader::DocReader;
pub use writer::DocWriter;

/// Size of one index entry in bytes.
pub const INDEX_ENTRY_SIZE: u64 = 8;

/// Conventional file name of the data file within a segment.
pub const DATA_FILE_NAME: &str = "documents.dat";

/// Conventional file name of the index file within a segment.
pub const INDEX_FILE_NAME: &str = "documents.ix";

/// Path of the data file for the segment named `segment_name`.
pub fn data_file_path(segment_name: &str) -> String {
    format!("{segment_name}/{DATA_FILE_NAME}")
}

/// Path of the index file for the segment named `segment_name`.
pub fn index_file_path(segment_name: &str) -> String {
    format!("{segment_name}/{INDEX_FILE_NAME}")
}
