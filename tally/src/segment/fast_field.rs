use super::{DocId, Segment, Shard, ValueColumn};
use crate::value::Value;
use crate::Result;
use std::fmt::Debug;
use std::sync::Arc;
use tantivy::columnar::StrColumn;
use tantivy::fastfield::Column;
use tantivy::schema::FieldType;
use tantivy::{Index, SegmentReader};

/// A tantivy segment read through its fast fields.
///
/// Only fast fields are mapped; a field missing from the schema, or indexed
/// without the fast flag, has no column.
pub struct TantivySegment {
    ord: u32,
    reader: SegmentReader,
}

impl TantivySegment {
    pub fn new(ord: u32, reader: SegmentReader) -> Self {
        Self { ord, reader }
    }
}

struct FastColumn<T> {
    column: Column<T>,
    to_value: fn(T) -> Value,
}

impl<T> ValueColumn for FastColumn<T>
where
    T: PartialOrd + Copy + Debug + Send + Sync + 'static,
{
    fn values_for_doc(&self, doc: DocId, out: &mut Vec<Value>) {
        out.extend(self.column.values_for_doc(doc).map(self.to_value));
    }
}

struct FastStrColumn {
    column: StrColumn,
}

impl ValueColumn for FastStrColumn {
    fn values_for_doc(&self, doc: DocId, out: &mut Vec<Value>) {
        let mut buf = String::new();
        for ord in self.column.term_ords(doc) {
            buf.clear();
            if let Ok(true) = self.column.ord_to_str(ord, &mut buf) {
                out.push(Value::Str(buf.clone()));
            }
        }
    }
}

impl Segment for TantivySegment {
    fn segment_ord(&self) -> u32 {
        self.ord
    }

    fn max_doc(&self) -> DocId {
        self.reader.max_doc()
    }

    fn is_alive(&self, doc: DocId) -> bool {
        doc < self.reader.max_doc() && !self.reader.is_deleted(doc)
    }

    fn live_docs(&self) -> Box<dyn Iterator<Item = DocId> + '_> {
        self.reader.doc_ids_alive()
    }

    fn num_docs(&self) -> u32 {
        self.reader.num_docs()
    }

    fn column(&self, field: &str) -> Option<Arc<dyn ValueColumn>> {
        let schema = self.reader.schema();
        let entry = schema.get_field_entry(schema.get_field(field).ok()?);
        if !entry.is_fast() {
            return None;
        }

        let fast_fields = self.reader.fast_fields();
        let column: Arc<dyn ValueColumn> = match entry.field_type() {
            FieldType::I64(_) => Arc::new(FastColumn {
                column: fast_fields.i64(field).ok()?,
                to_value: Value::I64,
            }),
            FieldType::U64(_) => Arc::new(FastColumn {
                column: fast_fields.u64(field).ok()?,
                to_value: Value::U64,
            }),
            FieldType::F64(_) => Arc::new(FastColumn {
                column: fast_fields.f64(field).ok()?,
                to_value: Value::F64,
            }),
            FieldType::Bool(_) => Arc::new(FastColumn {
                column: fast_fields.bool(field).ok()?,
                to_value: Value::Bool,
            }),
            FieldType::Str(_) => Arc::new(FastStrColumn {
                column: fast_fields.str(field).ok()??,
            }),
            other => {
                tracing::debug!(field, field_type = ?other.value_type(), "fast field type not aggregatable");
                return None;
            }
        };
        Some(column)
    }
}

/// Build a [`Shard`] over the segments currently searchable in `index`.
pub fn shard_from_index(name: impl Into<String>, index: &Index) -> Result<Shard> {
    let searcher = index.reader()?.searcher();
    let segments = searcher
        .segment_readers()
        .iter()
        .enumerate()
        .map(|(ord, reader)| {
            Arc::new(TantivySegment::new(ord as u32, reader.clone())) as Arc<dyn Segment>
        })
        .collect();
    Ok(Shard::new(name, segments))
}
