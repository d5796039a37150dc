//! Field types and the schema that maps field names to them.

use std::sync::Arc;

use ahash::AHashMap;
use lumen_common::{Result, error::Error};

use crate::{analysis::Analyzer, document::FieldValue};

/// Primitive type of a field value.
///
/// This enumeration is shared by the document store codec and by the inverter's type
/// validation, so the two always agree on the set of supported types. The
/// discriminants are the stable one-byte tags used in serialized documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PrimitiveType {
    Text = 1,
    Blob = 2,
    Int32 = 3,
    Int64 = 4,
    Float32 = 5,
    Float64 = 6,
}

impl PrimitiveType {
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveType::Text => "text",
            PrimitiveType::Blob => "blob",
            PrimitiveType::Int32 => "int32",
            PrimitiveType::Int64 => "int64",
            PrimitiveType::Float32 => "float32",
            PrimitiveType::Float64 => "float64",
        }
    }

    pub fn tag(&self) -> u8 {
        *self as u8
    }

    /// Name of the value family a field of this type accepts: `text`, `blob`,
    /// `integer` or `float`.
    pub fn family(&self) -> &'static str {
        match self {
            PrimitiveType::Text => "text",
            PrimitiveType::Blob => "blob",
            PrimitiveType::Int32 | PrimitiveType::Int64 => "integer",
            PrimitiveType::Float32 | PrimitiveType::Float64 => "float",
        }
    }

    /// Returns `true` if `value` belongs to the family of this type. Integer fields
    /// accept either integer width, float fields either float width.
    pub fn accepts(&self, value: &FieldValue) -> bool {
        self.family() == value.primitive_type().family()
    }
}

impl TryFrom<u8> for PrimitiveType {
    type Error = Error;

    fn try_from(tag: u8) -> Result<PrimitiveType> {
        match tag {
            1 => Ok(PrimitiveType::Text),
            2 => Ok(PrimitiveType::Blob),
            3 => Ok(PrimitiveType::Int32),
            4 => Ok(PrimitiveType::Int64),
            5 => Ok(PrimitiveType::Float32),
            6 => Ok(PrimitiveType::Float64),
            _ => Err(Error::unrecognized_type(format!("type tag {tag}"))),
        }
    }
}

impl std::fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared type of a field: its primitive type plus indexing and storage options.
#[derive(Debug, Clone)]
pub struct FieldType {
    primitive: PrimitiveType,
    indexed: bool,
    stored: bool,
    analyzer: Option<Arc<dyn Analyzer>>,
}

impl FieldType {
    /// Creates a field type with the defaults for `primitive`: text fields are
    /// indexed, all fields are stored.
    pub fn new(primitive: PrimitiveType) -> FieldType {
        FieldType {
            primitive,
            indexed: primitive == PrimitiveType::Text,
            stored: true,
            analyzer: None,
        }
    }

    pub fn text() -> FieldType {
        Self::new(PrimitiveType::Text)
    }

    pub fn blob() -> FieldType {
        Self::new(PrimitiveType::Blob)
    }

    pub fn int32() -> FieldType {
        Self::new(PrimitiveType::Int32)
    }

    pub fn int64() -> FieldType {
        Self::new(PrimitiveType::Int64)
    }

    pub fn float32() -> FieldType {
        Self::new(PrimitiveType::Float32)
    }

    pub fn float64() -> FieldType {
        Self::new(PrimitiveType::Float64)
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> FieldType {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn indexed(mut self, indexed: bool) -> FieldType {
        self.indexed = indexed;
        self
    }

    pub fn stored(mut self, stored: bool) -> FieldType {
        self.stored = stored;
        self
    }

    pub fn primitive(&self) -> PrimitiveType {
        self.primitive
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    pub fn is_stored(&self) -> bool {
        self.stored
    }

    pub fn analyzer(&self) -> Option<&Arc<dyn Analyzer>> {
        self.analyzer.as_ref()
    }
}

/// Maps field names to their declared [`FieldType`].
#[derive(Debug, Clone, Default)]
pub struct Schema {
    types: AHashMap<String, FieldType>,
    names: Vec<String>,
}

impl Schema {
    pub fn new() -> Schema {
        Default::default()
    }

    /// Declares `name` with `field_type`.
    ///
    /// Re-declaring a field replaces its options, but its primitive type may not
    /// change.
    pub fn spec_field(&mut self, name: impl Into<String>, field_type: FieldType) -> Result<()> {
        let name = name.into();
        match self.types.get_mut(&name) {
            Some(existing) if existing.primitive != field_type.primitive => {
                Err(Error::invalid_arg(
                    name,
                    format!(
                        "already declared as {}, cannot redeclare as {}",
                        existing.primitive, field_type.primitive
                    ),
                ))
            }
            Some(existing) => {
                *existing = field_type;
                Ok(())
            }
            None => {
                self.names.push(name.clone());
                self.types.insert(name, field_type);
                Ok(())
            }
        }
    }

    /// Builder-style variant of [`spec_field`](Schema::spec_field).
    pub fn with_field(mut self, name: impl Into<String>, field_type: FieldType) -> Result<Schema> {
        self.spec_field(name, field_type)?;
        Ok(self)
    }

    /// Type declared for `name`, if any.
    pub fn fetch_type(&self, name: &str) -> Option<&FieldType> {
        self.types.get(name)
    }

    pub fn num_fields(&self) -> usize {
        self.names.len()
    }

    /// Declared field names, in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use lumen_common::error::ErrorKind;

    use super::{FieldType, PrimitiveType, Schema};
    use crate::document::FieldValue;

    #[test]
    fn test_tags_roundtrip() {
        for ty in [
            PrimitiveType::Text,
            PrimitiveType::Blob,
            PrimitiveType::Int32,
            PrimitiveType::Int64,
            PrimitiveType::Float32,
            PrimitiveType::Float64,
        ] {
            assert_eq!(PrimitiveType::try_from(ty.tag()).unwrap(), ty);
        }
        for tag in [0u8, 7, 255] {
            let err = PrimitiveType::try_from(tag).unwrap_err();
            assert!(matches!(err.kind(), ErrorKind::UnrecognizedType { .. }));
        }
    }

    #[test]
    fn test_accepts_by_family() {
        assert!(PrimitiveType::Text.accepts(&FieldValue::from("x")));
        assert!(!PrimitiveType::Text.accepts(&FieldValue::Blob(vec![1])));
        assert!(PrimitiveType::Blob.accepts(&FieldValue::Blob(vec![1])));
        assert!(PrimitiveType::Int32.accepts(&FieldValue::Int64(1)));
        assert!(PrimitiveType::Int64.accepts(&FieldValue::Int32(1)));
        assert!(!PrimitiveType::Int64.accepts(&FieldValue::Float64(1.0)));
        assert!(PrimitiveType::Float32.accepts(&FieldValue::Float64(1.0)));
        assert!(!PrimitiveType::Float64.accepts(&FieldValue::from("1.0")));
    }

    #[test]
    fn test_field_type_defaults() {
        let text = FieldType::text();
        assert!(text.is_indexed());
        assert!(text.is_stored());
        assert!(text.analyzer().is_none());

        let price = FieldType::float64().stored(false);
        assert!(!price.is_indexed());
        assert!(!price.is_stored());
        assert_eq!(price.primitive(), PrimitiveType::Float64);
    }

    #[test]
    fn test_spec_field() {
        let mut schema = Schema::new();
        schema.spec_field("title", FieldType::text()).unwrap();
        schema.spec_field("count", FieldType::int32()).unwrap();
        schema
            .spec_field("title", FieldType::text().indexed(false))
            .unwrap();
        assert_eq!(schema.num_fields(), 2);
        assert_eq!(schema.field_names().collect::<Vec<_>>(), ["title", "count"]);
        assert!(!schema.fetch_type("title").unwrap().is_indexed());
        assert!(schema.fetch_type("missing").is_none());

        let err = schema.spec_field("count", FieldType::text()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidArgument { .. }));
        assert_eq!(
            schema.fetch_type("count").unwrap().primitive(),
            PrimitiveType::Int32
        );
    }
}
