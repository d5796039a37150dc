use std::{borrow::Cow, sync::Arc};

use lumen_common::{Result, error::Error, verify_arg, verify_data};
use lumen_store::OutStream;

use super::INDEX_ENTRY_SIZE;
use crate::{
    document::{Document, FieldValue},
    schema::Schema,
};

/// Appends documents to a document store.
///
/// The data and index streams advance in lockstep: a document's index entry never
/// reaches the index handle before the document's record has reached the data
/// handle, so a reader sharing the files never sees an entry pointing past the end
/// of the data.
pub struct DocWriter {
    // Declared before `ix_out` so that on drop the data stream is flushed first.
    dat_out: OutStream,
    ix_out: OutStream,
    schema: Arc<Schema>,
    doc_count: u32,
}

impl DocWriter {
    /// Creates a writer over a data stream and an index stream.
    ///
    /// If the index stream already holds entries, document ids continue after the
    /// last one.
    pub fn new(dat_out: OutStream, ix_out: OutStream, schema: Arc<Schema>) -> Result<DocWriter> {
        let ix_len = ix_out.tell();
        verify_data!(ix_len, ix_len % INDEX_ENTRY_SIZE == 0);
        let doc_count = u32::try_from(ix_len / INDEX_ENTRY_SIZE)
            .map_err(|_| Error::invalid_format("document index", "too many entries"))?;
        log::debug!(
            "opening document writer over '{}' and '{}' at document {doc_count}",
            dat_out.path(),
            ix_out.path()
        );
        Ok(DocWriter {
            dat_out,
            ix_out,
            schema,
            doc_count,
        })
    }

    /// Number of documents written so far, which is also the id of the next one.
    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Writes `doc` and returns its id.
    ///
    /// `doc.doc_id()` must equal [`doc_count`](DocWriter::doc_count). Every field is
    /// checked against the schema before any byte is written, so a rejected document
    /// leaves both files untouched.
    pub fn add_doc(&mut self, doc: &Document) -> Result<u32> {
        let doc_id = self.doc_count;
        verify_arg!(doc_id, doc.doc_id() == doc_id);

        let fields = self.stored_fields(doc)?;

        let start = self.dat_out.tell();
        self.dat_out.write_c32(fields.len() as u32)?;
        for (name, value) in &fields {
            self.dat_out.write_string(name)?;
            value.write_to(&mut self.dat_out)?;
        }

        if self.ix_out.pending() + INDEX_ENTRY_SIZE as usize > self.ix_out.buffer_size() {
            self.dat_out.flush()?;
        }
        self.ix_out.write_u64(start)?;

        self.doc_count += 1;
        log::trace!(
            "stored document {doc_id}: {} fields, {} bytes",
            fields.len(),
            self.dat_out.tell() - start
        );
        Ok(doc_id)
    }

    /// Flushes and closes both streams, returning the number of documents written.
    pub fn finish(mut self) -> Result<u32> {
        self.dat_out.close()?;
        self.ix_out.close()?;
        log::debug!(
            "closed document writer over '{}' with {} documents",
            self.dat_out.path(),
            self.doc_count
        );
        Ok(self.doc_count)
    }

    /// Resolves the stored fields of `doc` in serialization order, with each value
    /// converted to the width of its declared type.
    fn stored_fields<'a>(&self, doc: &'a Document) -> Result<Vec<(&'a str, Cow<'a, FieldValue>)>> {
        let mut fields = Vec::with_capacity(doc.len());
        for (name, value) in doc.sorted_fields() {
            let field_type = self
                .schema
                .fetch_type(name)
                .ok_or_else(|| Error::unknown_field(name))?;
            if !field_type.is_stored() {
                continue;
            }
            fields.push((name, value.coerce(name, field_type.primitive())?));
        }
        Ok(fields)
    }
}
