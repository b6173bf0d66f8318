use super::{DocId, Segment, ValueColumn};
use crate::value::Value;
use crate::{Error, Result};
use roaring::RoaringBitmap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Column-oriented, in-memory segment.
pub struct MemorySegment {
    ord: u32,
    max_doc: DocId,
    deleted: RoaringBitmap,
    columns: HashMap<String, Arc<MemoryColumn>>,
}

/// Values of one field, laid out as `offsets[doc]..offsets[doc + 1]`.
struct MemoryColumn {
    offsets: Vec<u32>,
    values: Vec<Value>,
}

impl ValueColumn for MemoryColumn {
    fn values_for_doc(&self, doc: DocId, out: &mut Vec<Value>) {
        let doc = doc as usize;
        if doc + 1 >= self.offsets.len() {
            return;
        }
        let (start, end) = (self.offsets[doc] as usize, self.offsets[doc + 1] as usize);
        out.extend_from_slice(&self.values[start..end]);
    }
}

impl MemorySegment {
    pub fn builder(ord: u32) -> MemorySegmentBuilder {
        MemorySegmentBuilder::new(ord)
    }

    /// Mark a document as deleted. It stops being returned by `live_docs`.
    pub fn delete(&mut self, doc: DocId) {
        if doc < self.max_doc {
            self.deleted.insert(doc);
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }
}

impl Segment for MemorySegment {
    fn segment_ord(&self) -> u32 {
        self.ord
    }

    fn max_doc(&self) -> DocId {
        self.max_doc
    }

    fn is_alive(&self, doc: DocId) -> bool {
        doc < self.max_doc && !self.deleted.contains(doc)
    }

    fn num_docs(&self) -> u32 {
        self.max_doc - self.deleted.len() as u32
    }

    fn column(&self, field: &str) -> Option<Arc<dyn ValueColumn>> {
        self.columns
            .get(field)
            .map(|c| Arc::clone(c) as Arc<dyn ValueColumn>)
    }
}

/// Builds a [`MemorySegment`] from JSON documents.
///
/// Arrays become multi-valued fields, nested objects are flattened to
/// dotted field names and `null` stores nothing. Every field seen in any
/// document (or declared with [`map_field`](Self::map_field)) is mapped.
pub struct MemorySegmentBuilder {
    ord: u32,
    rows: Vec<HashMap<String, Vec<Value>>>,
    // first-seen order
    mapped: Vec<String>,
    seen: HashSet<String>,
}

impl MemorySegmentBuilder {
    pub fn new(ord: u32) -> Self {
        Self {
            ord,
            rows: Vec::new(),
            mapped: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Declare a field as mapped even if no document carries a value for it.
    pub fn map_field(mut self, field: impl Into<String>) -> Self {
        self.mark_mapped(field.into());
        self
    }

    fn mark_mapped(&mut self, field: String) {
        if self.seen.insert(field.clone()) {
            self.mapped.push(field);
        }
    }

    pub fn add_document(&mut self, doc: &serde_json::Value) -> Result<DocId> {
        let obj = doc.as_object().ok_or_else(|| {
            Error::InvalidRequest(format!("document must be a JSON object, got: {}", doc))
        })?;

        let mut row = HashMap::new();
        for (name, value) in obj {
            flatten_into(name, value, &mut row);
        }
        for name in row.keys() {
            if !self.seen.contains(name) {
                self.mark_mapped(name.clone());
            }
        }

        self.rows.push(row);
        Ok((self.rows.len() - 1) as DocId)
    }

    pub fn with_documents<'a>(
        mut self,
        docs: impl IntoIterator<Item = &'a serde_json::Value>,
    ) -> Result<Self> {
        for doc in docs {
            self.add_document(doc)?;
        }
        Ok(self)
    }

    pub fn build(self) -> MemorySegment {
        let mut columns = HashMap::with_capacity(self.mapped.len());
        for field in &self.mapped {
            let mut offsets = Vec::with_capacity(self.rows.len() + 1);
            let mut values = Vec::new();
            offsets.push(0u32);
            for row in &self.rows {
                if let Some(vals) = row.get(field) {
                    values.extend(vals.iter().cloned());
                }
                offsets.push(values.len() as u32);
            }
            columns.insert(field.clone(), Arc::new(MemoryColumn { offsets, values }));
        }

        MemorySegment {
            ord: self.ord,
            max_doc: self.rows.len() as DocId,
            deleted: RoaringBitmap::new(),
            columns,
        }
    }
}

fn flatten_into(path: &str, value: &serde_json::Value, row: &mut HashMap<String, Vec<Value>>) {
    match value {
        serde_json::Value::Null => {}
        serde_json::Value::Array(items) => {
            for item in items {
                flatten_into(path, item, row);
            }
        }
        serde_json::Value::Object(obj) => {
            for (name, inner) in obj {
                flatten_into(&format!("{}.{}", path, name), inner, row);
            }
        }
        scalar => {
            if let Some(v) = Value::from_json(scalar) {
                row.entry(path.to_string()).or_default().push(v);
            }
        }
    }
}
