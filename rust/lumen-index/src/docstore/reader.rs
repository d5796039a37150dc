use std::sync::Arc;

use lumen_common::{Result, error::Error};
use lumen_store::InStream;

use super::INDEX_ENTRY_SIZE;
use crate::{
    document::{Document, FieldValue, HitDoc},
    schema::Schema,
};

/// Reconstructs documents from a document store by id.
pub struct DocReader {
    dat_in: InStream,
    ix_in: InStream,
    schema: Arc<Schema>,
    doc_count: u32,
    field_name: Vec<u8>,
}

impl DocReader {
    /// Opens a reader over a data stream and an index stream. The index length must
    /// be a whole number of entries.
    pub fn open(dat_in: InStream, ix_in: InStream, schema: Arc<Schema>) -> Result<DocReader> {
        let ix_len = ix_in.length();
        if ix_len % INDEX_ENTRY_SIZE != 0 {
            return Err(Error::invalid_format(
                "document index",
                format!(
                    "length {ix_len} of '{}' is not a multiple of {INDEX_ENTRY_SIZE}",
                    ix_in.path()
                ),
            ));
        }
        let doc_count = u32::try_from(ix_len / INDEX_ENTRY_SIZE)
            .map_err(|_| Error::invalid_format("document index", "too many entries"))?;
        log::debug!(
            "opened document reader over '{}' with {doc_count} documents",
            dat_in.path()
        );
        Ok(DocReader {
            dat_in,
            ix_in,
            schema,
            doc_count,
            field_name: Vec::with_capacity(32),
        })
    }

    /// Number of documents in the store.
    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Reads document `doc_id` back. The returned hit has a score of zero.
    ///
    /// Fails with `OutOfRange` for ids at or beyond [`doc_count`](DocReader::doc_count)
    /// and with `UnknownField` if a stored field has no type in the schema.
    pub fn fetch_doc(&mut self, doc_id: u32) -> Result<HitDoc> {
        let ix_pos = doc_id as u64 * INDEX_ENTRY_SIZE;
        if doc_id >= self.doc_count {
            return Err(Error::out_of_range(
                ix_pos as i64,
                INDEX_ENTRY_SIZE,
                self.ix_in.length(),
            ));
        }
        self.ix_in.seek(ix_pos)?;
        let start = self.ix_in.read_u64()?;
        self.dat_in.seek(start)?;

        let num_fields = self.dat_in.read_c32()?;
        let mut doc = Document::new(doc_id);
        for _ in 0..num_fields {
            let name_len = self.dat_in.read_c32()?;
            self.dat_in.verify_available(name_len as u64)?;
            self.field_name.resize(name_len as usize, 0);
            self.dat_in.read_bytes(&mut self.field_name)?;
            let name = std::str::from_utf8(&self.field_name)
                .map_err(|e| Error::invalid_format("field name", e.to_string()))?;

            let field_type = self
                .schema
                .fetch_type(name)
                .ok_or_else(|| Error::unknown_field(name))?;
            let value = FieldValue::read_from(&mut self.dat_in, field_type.primitive())?;
            doc.store(name, value);
        }
        log::trace!("fetched document {doc_id}: {num_fields} fields from offset {start}");
        Ok(HitDoc::new(doc, 0.0))
    }

    /// Closes both streams.
    pub fn close(&mut self) -> Result<()> {
        self.dat_in.close()?;
        self.ix_in.close()
    }
}
