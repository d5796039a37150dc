//! Per-document inversion.
//!
//! The [`Inverter`] takes one document at a time and produces an [`InverterEntry`]
//! for every field it carries: the field's segment-local number, its declared type,
//! the current value and, for indexed fields, the [`Inversion`] the posting-list
//! builder consumes.
//!
//! Entries are pooled by field number and reused for every document of the
//! segment. An entry's value is only replaced when the new document carries a
//! different value object (compared by identity), in which case the inversion is
//! recomputed as well.

use std::sync::Arc;

use lumen_common::{Result, error::Error};

use crate::{
    analysis::Inversion,
    document::{Document, FieldValue},
    schema::{FieldType, PrimitiveType, Schema},
    segment::Segment,
};

/// The state of one field within the segment being built.
#[derive(Debug)]
pub struct InverterEntry {
    field_name: String,
    field_num: u32,
    field_type: FieldType,
    value: Option<Arc<FieldValue>>,
    inversion: Option<Inversion>,
}

impl InverterEntry {
    fn new(field_name: &str, field_num: u32, field_type: FieldType) -> InverterEntry {
        InverterEntry {
            field_name: field_name.to_string(),
            field_num,
            field_type,
            value: None,
            inversion: None,
        }
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn field_num(&self) -> u32 {
        self.field_num
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    /// Value of the field in the most recent document that carried it.
    pub fn value(&self) -> Option<&Arc<FieldValue>> {
        self.value.as_ref()
    }

    /// Tokens of the current value. `None` for fields that are not indexed and for
    /// numeric values.
    pub fn inversion(&self) -> Option<&Inversion> {
        self.inversion.as_ref()
    }

    /// Stores `value` unless it is the value already held, and refreshes the
    /// inversion accordingly. Returns `true` if the value was replaced.
    fn set_value(&mut self, value: Arc<FieldValue>) -> bool {
        if self
            .value
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &value))
        {
            return false;
        }
        self.inversion = invert_value(&self.field_type, &value);
        self.value = Some(value);
        true
    }
}

fn invert_value(field_type: &FieldType, value: &FieldValue) -> Option<Inversion> {
    if !field_type.is_indexed() {
        return None;
    }
    match value {
        FieldValue::Text(text) => Some(match field_type.analyzer() {
            Some(analyzer) => analyzer.transform_text(text),
            None => Inversion::single(text.as_str()),
        }),
        FieldValue::Blob(bytes) => Some(Inversion::single(String::from_utf8_lossy(bytes))),
        _ => None,
    }
}

/// Turns documents into per-field [`InverterEntry`]s for one segment.
#[derive(Debug)]
pub struct Inverter {
    schema: Arc<Schema>,
    segment: Segment,
    doc: Option<Arc<Document>>,
    /// Indexed by field number; slot 0 is never used.
    entry_pool: Vec<Option<InverterEntry>>,
    /// Field numbers of the current document, ascending.
    entries: Vec<u32>,
}

impl Inverter {
    pub fn new(schema: Arc<Schema>, segment: Segment) -> Inverter {
        Inverter {
            schema,
            segment,
            doc: None,
            entry_pool: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Inverts every field of `doc`.
    ///
    /// Field numbers missing from the segment are allocated for fields the schema
    /// declares. If a field is unknown (`UnknownField`) or carries a value outside
    /// its declared type family (`TypeMismatch`), the inverter is left as it was
    /// before the call: the previous document and all entry values stay in place.
    pub fn invert_doc(&mut self, doc: Arc<Document>) -> Result<()> {
        let mut resolved = Vec::with_capacity(doc.len());
        for (name, value) in doc.iter() {
            let field_num = self.fetch_entry(name)?;
            let field_type = self.pooled(field_num)?.field_type();
            check_type(name, field_type.primitive(), value)?;
            resolved.push((field_num, Arc::clone(value)));
        }
        resolved.sort_unstable_by_key(|&(field_num, _)| field_num);

        self.entries.clear();
        for (field_num, value) in resolved {
            if let Some(entry) = self.pool_slot(field_num) {
                entry.set_value(value);
            }
            self.entries.push(field_num);
        }
        log::trace!(
            "inverted document {} into {} entries of segment {}",
            doc.doc_id(),
            self.entries.len(),
            self.segment.number()
        );
        self.doc = Some(doc);
        Ok(())
    }

    /// The document most recently inverted.
    pub fn doc(&self) -> Option<&Arc<Document>> {
        self.doc.as_ref()
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    /// Entries of the current document in ascending field number order.
    pub fn iter(&self) -> impl Iterator<Item = &InverterEntry> {
        self.entries
            .iter()
            .filter_map(|&field_num| self.entry(field_num))
    }

    /// Number of entries populated by the current document.
    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    /// Number of entries allocated in the pool.
    pub fn pool_size(&self) -> usize {
        self.entry_pool.iter().filter(|slot| slot.is_some()).count()
    }

    /// Pooled entry for `field_num`.
    pub fn entry(&self, field_num: u32) -> Option<&InverterEntry> {
        self.entry_pool
            .get(field_num as usize)
            .and_then(Option::as_ref)
    }

    /// Forgets the current document. Pooled entries are kept.
    pub fn clear(&mut self) {
        self.doc = None;
        self.entries.clear();
    }

    /// Switches to a new segment, dropping all pooled entries, and returns the
    /// previous segment.
    pub fn reset(&mut self, segment: Segment) -> Segment {
        log::debug!(
            "resetting inverter from segment {} to segment {}, dropping {} entries",
            self.segment.number(),
            segment.number(),
            self.pool_size()
        );
        self.clear();
        self.entry_pool.clear();
        std::mem::replace(&mut self.segment, segment)
    }

    /// Resolves the field number of `name`, creating its pooled entry on first use.
    fn fetch_entry(&mut self, name: &str) -> Result<u32> {
        let field_type = self
            .schema
            .fetch_type(name)
            .ok_or_else(|| Error::unknown_field(name))?;
        let field_num = match self.segment.field_num(name) {
            Some(field_num) => field_num,
            None => self.segment.add_field(name),
        };
        let index = field_num as usize;
        if self.entry_pool.len() <= index {
            self.entry_pool.resize_with(index + 1, || None);
        }
        if self.entry_pool[index].is_none() {
            log::trace!("creating inverter entry {field_num} for field '{name}'");
            self.entry_pool[index] = Some(InverterEntry::new(name, field_num, field_type.clone()));
        }
        Ok(field_num)
    }

    fn pooled(&self, field_num: u32) -> Result<&InverterEntry> {
        self.entry(field_num)
            .ok_or_else(|| Error::invalid_operation(format!("no pooled entry for field {field_num}")))
    }

    fn pool_slot(&mut self, field_num: u32) -> Option<&mut InverterEntry> {
        self.entry_pool
            .get_mut(field_num as usize)
            .and_then(Option::as_mut)
    }
}

fn check_type(name: &str, primitive: PrimitiveType, value: &FieldValue) -> Result<()> {
    if primitive.accepts(value) {
        Ok(())
    } else {
        Err(Error::type_mismatch(
            name,
            primitive.family(),
            value.primitive_type().name(),
        ))
    }
}
