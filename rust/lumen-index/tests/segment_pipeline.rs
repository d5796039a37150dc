use std::{path::Path, sync::Arc};

use lumen_common::error::ErrorKind;
use lumen_index::{
    DocReader, DocWriter, Document, FieldType, FieldValue, Inverter, Schema, Segment,
    WordTokenizer,
    docstore::{DATA_FILE_NAME, INDEX_FILE_NAME},
};
use lumen_store::{FsFileHandle, InStream, OpenFlags, OutStream, StreamConfig};

fn schema() -> Arc<Schema> {
    let schema = Schema::new()
        .with_field(
            "content",
            FieldType::text().with_analyzer(Arc::new(WordTokenizer::new())),
        )
        .and_then(|s| s.with_field("url", FieldType::text().indexed(false)))
        .and_then(|s| s.with_field("digest", FieldType::blob()))
        .and_then(|s| s.with_field("rank", FieldType::int32()))
        .and_then(|s| s.with_field("bytes", FieldType::int64()))
        .and_then(|s| s.with_field("weight", FieldType::float32()))
        .and_then(|s| s.with_field("score", FieldType::float64()))
        .unwrap();
    Arc::new(schema)
}

const WORDS: &[&str] = &["alpha", "beta", "gamma", "delta", "don't", "\u{fc}ber", "x_y", "42"];

fn random_doc(rng: &mut fastrand::Rng, doc_id: u32) -> Document {
    let mut doc = Document::new(doc_id);
    let num_words = rng.usize(0..12);
    let content = (0..num_words)
        .map(|_| WORDS[rng.usize(..WORDS.len())])
        .collect::<Vec<_>>()
        .join(" ");
    doc.store("content", content);
    if rng.bool() {
        doc.store("url", format!("https://example.com/{doc_id}"));
    }
    if rng.bool() {
        doc.store("digest", (0..rng.usize(0..40)).map(|_| rng.u8(..)).collect::<Vec<u8>>());
    }
    doc.store("rank", rng.i32(..));
    doc.store("bytes", rng.i64(..));
    if rng.bool() {
        doc.store("weight", rng.f32());
    }
    doc.store("score", rng.f64() * 1e6);
    doc
}

fn open_out(path: &Path) -> OutStream {
    let fh = FsFileHandle::open(path, OpenFlags::WRITE_ONLY | OpenFlags::CREATE).unwrap();
    OutStream::with_config(fh, StreamConfig::with_buffer_size(256)).unwrap()
}

fn open_in(path: &Path) -> InStream {
    let fh = FsFileHandle::open(path, OpenFlags::READ_ONLY).unwrap();
    InStream::with_config(fh, StreamConfig::with_buffer_size(64)).unwrap()
}

#[test]
fn test_store_and_fetch_over_fs() {
    let tempdir = tempfile::tempdir().expect("tempdir");
    let dat_path = tempdir.path().join(DATA_FILE_NAME);
    let ix_path = tempdir.path().join(INDEX_FILE_NAME);
    let schema = schema();

    let mut rng = fastrand::Rng::with_seed(1234);
    let docs = (0..200).map(|id| random_doc(&mut rng, id)).collect::<Vec<_>>();

    let mut writer = DocWriter::new(open_out(&dat_path), open_out(&ix_path), schema.clone()).unwrap();
    for doc in &docs {
        assert_eq!(writer.add_doc(doc).unwrap(), doc.doc_id());
    }
    assert_eq!(writer.finish().unwrap(), docs.len() as u32);

    let mut reader = DocReader::open(open_in(&dat_path), open_in(&ix_path), schema).unwrap();
    assert_eq!(reader.doc_count(), docs.len() as u32);

    let mut ids = (0..docs.len() as u32).collect::<Vec<_>>();
    rng.shuffle(&mut ids);
    for id in ids {
        let hit = reader.fetch_doc(id).unwrap();
        assert_eq!(hit.doc_id(), id);
        assert_eq!(hit.score(), 0.0);
        assert_eq!(*hit, docs[id as usize], "document {id}");
    }
    assert!(reader.fetch_doc(docs.len() as u32).unwrap_err().is_out_of_range());
    reader.close().unwrap();
}

#[test]
fn test_invert_segment() {
    let schema = schema();
    let mut inverter = Inverter::new(schema, Segment::new(3));
    let mut rng = fastrand::Rng::with_seed(99);

    for doc_id in 0..50 {
        let doc = Arc::new(random_doc(&mut rng, doc_id));
        inverter.invert_doc(doc.clone()).unwrap();
        assert_eq!(inverter.num_entries(), doc.len());

        let mut previous = 0;
        for entry in inverter.iter() {
            assert!(entry.field_num() > previous);
            previous = entry.field_num();
            let value = doc.extract_shared(entry.field_name()).unwrap();
            assert!(Arc::ptr_eq(entry.value().unwrap(), value));

            match (entry.field_name(), value.as_ref()) {
                ("content", FieldValue::Text(text)) => {
                    let terms = entry.inversion().unwrap().terms().count();
                    assert_eq!(terms, text.split_whitespace().count());
                }
                ("digest", _) => assert_eq!(entry.inversion().unwrap().len(), 1),
                _ => assert!(entry.inversion().is_none()),
            }
        }
        let pool_size = inverter.pool_size();
        inverter.invert_doc(doc).unwrap();
        assert_eq!(inverter.pool_size(), pool_size);
    }
    assert!(inverter.segment().num_fields() <= 7);

    let mut bad = Document::new(50);
    bad.store("content", "fine");
    bad.store("digest", 17i32);
    let err = inverter.invert_doc(Arc::new(bad)).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::TypeMismatch { .. }));
    assert_eq!(inverter.doc().map(|d| d.doc_id()), Some(49));
}
