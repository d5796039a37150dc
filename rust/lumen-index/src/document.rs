//! Typed field values and documents.

use std::{borrow::Cow, sync::Arc};

use ahash::AHashMap;
use lumen_common::{Result, error::Error};
use lumen_store::{InStream, OutStream};

use crate::schema::PrimitiveType;

/// A single field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Blob(Vec<u8>),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
}

impl FieldValue {
    pub fn primitive_type(&self) -> PrimitiveType {
        match self {
            FieldValue::Text(_) => PrimitiveType::Text,
            FieldValue::Blob(_) => PrimitiveType::Blob,
            FieldValue::Int32(_) => PrimitiveType::Int32,
            FieldValue::Int64(_) => PrimitiveType::Int64,
            FieldValue::Float32(_) => PrimitiveType::Float32,
            FieldValue::Float64(_) => PrimitiveType::Float64,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// Integer value of either width.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            FieldValue::Int32(v) => Some(v as i64),
            FieldValue::Int64(v) => Some(v),
            _ => None,
        }
    }

    /// Float value of either width.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            FieldValue::Float32(v) => Some(v as f64),
            FieldValue::Float64(v) => Some(v),
            _ => None,
        }
    }

    /// Converts the value to the exact width of `primitive`.
    ///
    /// Values of the same family are widened or narrowed; an `Int64` that does not
    /// fit an `Int32` field and any cross-family value fail with `TypeMismatch`.
    pub fn coerce(&self, field: &str, primitive: PrimitiveType) -> Result<Cow<'_, FieldValue>> {
        let mismatch = || Error::type_mismatch(field, primitive.name(), self.primitive_type().name());
        if self.primitive_type() == primitive {
            return Ok(Cow::Borrowed(self));
        }
        let value = match (primitive, self) {
            (PrimitiveType::Int32, &FieldValue::Int64(v)) => {
                FieldValue::Int32(i32::try_from(v).map_err(|_| mismatch())?)
            }
            (PrimitiveType::Int64, &FieldValue::Int32(v)) => FieldValue::Int64(v as i64),
            (PrimitiveType::Float32, &FieldValue::Float64(v)) => FieldValue::Float32(v as f32),
            (PrimitiveType::Float64, &FieldValue::Float32(v)) => FieldValue::Float64(v as f64),
            _ => return Err(mismatch()),
        };
        Ok(Cow::Owned(value))
    }

    /// Writes the value body in the width of its own type: text and blobs as a C32
    /// length plus raw bytes, Int32 as C32, Int64 as C64, floats fixed-width.
    pub fn write_to(&self, out: &mut OutStream) -> Result<()> {
        match self {
            FieldValue::Text(s) => out.write_string(s),
            FieldValue::Blob(b) => {
                let len = u32::try_from(b.len())
                    .map_err(|_| Error::invalid_arg("blob", "longer than u32::MAX bytes"))?;
                out.write_c32(len)?;
                out.write_bytes(b)
            }
            FieldValue::Int32(v) => out.write_c32(*v as u32),
            FieldValue::Int64(v) => out.write_c64(*v as u64),
            FieldValue::Float32(v) => out.write_f32(*v),
            FieldValue::Float64(v) => out.write_f64(*v),
        }
    }

    /// Reads a value body written by [`write_to`](FieldValue::write_to) for a value of
    /// type `primitive`.
    pub fn read_from(input: &mut InStream, primitive: PrimitiveType) -> Result<FieldValue> {
        let value = match primitive {
            PrimitiveType::Text => FieldValue::Text(input.read_string()?),
            PrimitiveType::Blob => FieldValue::Blob(input.read_counted_bytes()?),
            PrimitiveType::Int32 => FieldValue::Int32(input.read_c32()? as i32),
            PrimitiveType::Int64 => FieldValue::Int64(input.read_c64()? as i64),
            PrimitiveType::Float32 => FieldValue::Float32(input.read_f32()?),
            PrimitiveType::Float64 => FieldValue::Float64(input.read_f64()?),
        };
        Ok(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        FieldValue::Blob(value)
    }
}

impl From<&[u8]> for FieldValue {
    fn from(value: &[u8]) -> Self {
        FieldValue::Blob(value.to_vec())
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int32(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int64(value)
    }
}

impl From<f32> for FieldValue {
    fn from(value: f32) -> Self {
        FieldValue::Float32(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float64(value)
    }
}

/// A document: a document id plus a set of uniquely named field values.
///
/// Values are shared (`Arc`) so that the same value object can be handed to several
/// documents, and so that consumers such as the inverter can tell a reused value
/// from a new one.
///
/// Two documents are equal when they have the same field names bound to equal
/// values; the document id does not take part in the comparison.
#[derive(Debug, Clone, Default)]
pub struct Document {
    doc_id: u32,
    fields: AHashMap<String, Arc<FieldValue>>,
}

impl Document {
    pub fn new(doc_id: u32) -> Document {
        Document {
            doc_id,
            fields: AHashMap::new(),
        }
    }

    /// Creates a document from `(name, value)` pairs. Later pairs replace earlier
    /// pairs with the same name.
    pub fn with_fields<N, V>(doc_id: u32, fields: impl IntoIterator<Item = (N, V)>) -> Document
    where
        N: Into<String>,
        V: Into<FieldValue>,
    {
        let mut doc = Document::new(doc_id);
        for (name, value) in fields {
            doc.store(name, value);
        }
        doc
    }

    pub fn doc_id(&self) -> u32 {
        self.doc_id
    }

    pub fn set_doc_id(&mut self, doc_id: u32) {
        self.doc_id = doc_id;
    }

    /// Binds `name` to `value`, returning the previous value.
    pub fn store(
        &mut self,
        name: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Option<Arc<FieldValue>> {
        self.store_shared(name, Arc::new(value.into()))
    }

    /// Binds `name` to an already shared value.
    pub fn store_shared(
        &mut self,
        name: impl Into<String>,
        value: Arc<FieldValue>,
    ) -> Option<Arc<FieldValue>> {
        self.fields.insert(name.into(), value)
    }

    pub fn extract(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name).map(Arc::as_ref)
    }

    pub fn extract_shared(&self, name: &str) -> Option<&Arc<FieldValue>> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over `(name, value)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<FieldValue>)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Field names in ascending byte order.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names = self.fields.keys().map(String::as_str).collect::<Vec<_>>();
        names.sort_unstable();
        names
    }

    /// `(name, value)` pairs in ascending byte order of the names. This is the order
    /// in which documents are serialized.
    pub fn sorted_fields(&self) -> Vec<(&str, &FieldValue)> {
        let mut fields = self
            .fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_ref()))
            .collect::<Vec<_>>();
        fields.sort_unstable_by(|a, b| a.0.cmp(b.0));
        fields
    }

    /// Writes a self-describing form of the document:
    /// `[C32 count] { [name] [u8 type tag] [value] }* [C32 doc_id]`.
    pub fn serialize(&self, out: &mut OutStream) -> Result<()> {
        out.write_c32(self.fields.len() as u32)?;
        for (name, value) in self.sorted_fields() {
            out.write_string(name)?;
            out.write_u8(value.primitive_type().tag())?;
            value.write_to(out)?;
        }
        out.write_c32(self.doc_id)
    }

    /// Reads a document written by [`serialize`](Document::serialize).
    pub fn deserialize(input: &mut InStream) -> Result<Document> {
        let num_fields = input.read_c32()?;
        let mut fields = AHashMap::new();
        for _ in 0..num_fields {
            let name = input.read_string()?;
            let primitive = PrimitiveType::try_from(input.read_u8()?)?;
            let value = FieldValue::read_from(input, primitive)?;
            fields.insert(name, Arc::new(value));
        }
        let doc_id = input.read_c32()?;
        Ok(Document { doc_id, fields })
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

/// A document returned from the document store, with its retrieval score.
#[derive(Debug, Clone, PartialEq)]
pub struct HitDoc {
    doc: Document,
    score: f32,
}

impl HitDoc {
    pub fn new(doc: Document, score: f32) -> HitDoc {
        HitDoc { doc, score }
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn set_score(&mut self, score: f32) {
        self.score = score;
    }

    pub fn into_doc(self) -> Document {
        self.doc
    }
}

impl std::ops::Deref for HitDoc {
    type Target = Document;

    fn deref(&self) -> &Document {
        &self.doc
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lumen_common::error::ErrorKind;
    use lumen_store::{InStream, OpenFlags, OutStream, RamFile, RamFileHandle};

    use super::{Document, FieldValue};
    use crate::schema::PrimitiveType;

    fn sample_doc() -> Document {
        let mut doc = Document::new(3);
        doc.store("title", "The Quick Brown Fox");
        doc.store("payload", vec![0u8, 1, 2, 255]);
        doc.store("count", -7i32);
        doc.store("bytes", 1i64 << 40);
        doc.store("ratio", 0.5f32);
        doc.store("price", 19.99f64);
        doc
    }

    #[test]
    fn test_store_and_extract() {
        let mut doc = sample_doc();
        assert_eq!(doc.len(), 6);
        assert_eq!(doc.doc_id(), 3);
        assert_eq!(doc.extract("title").and_then(FieldValue::as_text), Some("The Quick Brown Fox"));
        assert_eq!(doc.extract("count").and_then(FieldValue::as_i64), Some(-7));
        assert!(doc.extract("missing").is_none());

        let previous = doc.store("count", 8i32).unwrap();
        assert_eq!(*previous, FieldValue::Int32(-7));
        assert_eq!(doc.len(), 6);
        assert_eq!(
            doc.field_names(),
            ["bytes", "count", "payload", "price", "ratio", "title"]
        );
    }

    #[test]
    fn test_equality_ignores_doc_id_and_order() {
        let a = Document::with_fields(1, [("a", 1i32), ("b", 2i32)]);
        let b = Document::with_fields(9, [("b", 2i32), ("a", 1i32)]);
        assert_eq!(a, b);
        let c = Document::with_fields(1, [("a", 1i32), ("b", 3i32)]);
        assert_ne!(a, c);
        let d = Document::with_fields(1, [("a", 1i32)]);
        assert_ne!(a, d);
    }

    #[test]
    fn test_shared_values() {
        let value = Arc::new(FieldValue::from("shared"));
        let mut a = Document::new(0);
        let mut b = Document::new(1);
        a.store_shared("f", Arc::clone(&value));
        b.store_shared("f", Arc::clone(&value));
        assert!(Arc::ptr_eq(
            a.extract_shared("f").unwrap(),
            b.extract_shared("f").unwrap()
        ));
    }

    #[test]
    fn test_coerce() {
        let v = FieldValue::Int64(5);
        assert_eq!(
            *v.coerce("n", PrimitiveType::Int32).unwrap(),
            FieldValue::Int32(5)
        );
        let err = FieldValue::Int64(1 << 40)
            .coerce("n", PrimitiveType::Int32)
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::TypeMismatch { .. }));
        assert_eq!(
            *FieldValue::Float64(0.25)
                .coerce("r", PrimitiveType::Float32)
                .unwrap(),
            FieldValue::Float32(0.25)
        );
        let err = FieldValue::from("x")
            .coerce("r", PrimitiveType::Blob)
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::TypeMismatch { .. }));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let file = RamFile::default();
        let fh = RamFileHandle::open(None, OpenFlags::WRITE_ONLY, Some(file.clone())).unwrap();
        let mut out = OutStream::open(fh).unwrap();
        let doc = sample_doc();
        doc.serialize(&mut out).unwrap();
        Document::new(4).serialize(&mut out).unwrap();
        out.close().unwrap();

        let fh = RamFileHandle::open(None, OpenFlags::READ_ONLY, Some(file)).unwrap();
        let mut input = InStream::open(fh).unwrap();
        let restored = Document::deserialize(&mut input).unwrap();
        assert_eq!(restored, doc);
        assert_eq!(restored.doc_id(), 3);
        let empty = Document::deserialize(&mut input).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.doc_id(), 4);
    }

    #[test]
    fn test_deserialize_unknown_tag() {
        // One field named "a" with type tag 9.
        let file = RamFile::new(Some(vec![0x01, 0x01, b'a', 0x09, 0x00, 0x00]), false);
        let fh = RamFileHandle::open(None, OpenFlags::READ_ONLY, Some(file)).unwrap();
        let mut input = InStream::open(fh).unwrap();
        let err = Document::deserialize(&mut input).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnrecognizedType { .. }));
    }

    fn input_over(bytes: Vec<u8>) -> InStream {
        let file = RamFile::new(Some(bytes), false);
        let fh = RamFileHandle::open(None, OpenFlags::READ_ONLY, Some(file)).unwrap();
        InStream::open(fh).unwrap()
    }

    #[test]
    fn test_deserialize_huge_field_count() {
        let mut input = input_over(vec![0x8f, 0xff, 0xff, 0xff, 0x7f]);
        let err = Document::deserialize(&mut input).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::EndOfStream { .. }));
    }

    #[test]
    fn test_read_blob_past_end() {
        let mut input = input_over(vec![0x8f, 0xff, 0xff, 0xff, 0x7f, 0x01, 0x02]);
        let err = FieldValue::read_from(&mut input, PrimitiveType::Blob).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::EndOfStream { .. }));
        assert_eq!(input.tell(), 0);

        let mut input = input_over(vec![0x02, 0x01, 0x02]);
        let value = FieldValue::read_from(&mut input, PrimitiveType::Blob).unwrap();
        assert_eq!(value, FieldValue::Blob(vec![0x01, 0x02]));
    }
}
