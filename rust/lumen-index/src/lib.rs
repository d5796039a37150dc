//! Document model, document storage and per-document inversion for lumen segments.
//!
//! - [`schema`]: field types and the schema that declares them.
//! - [`segment`]: per-segment field numbering.
//! - [`document`]: typed field values and documents.
//! - [`docstore`]: the paired data/index files backing retrieval by document id.
//! - [`inverter`]: turns documents into per-field entries for posting construction.
//! - [`analysis`]: tokens, inversions and the analyzers that produce them.

pub mod analysis;
pub mod docstore;
pub mod document;
pub mod inverter;
pub mod schema;
pub mod segment;

pub use analysis::{Analyzer, Inversion, Token, WordTokenizer};
pub use docstore::{DocReader, DocWriter};
pub use document::{Document, FieldValue, HitDoc};
pub use inverter::{Inverter, InverterEntry};
pub use schema::{FieldType, PrimitiveType, Schema};
pub use segment::Segment;
