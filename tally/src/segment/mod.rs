//! Document value access.
//!
//! A [`Shard`] is an ordered list of [`Segment`]s. Each segment exposes its
//! live documents and, per field, a [`ValueColumn`] holding the values stored
//! for every document. A field that a segment does not map has no column;
//! readers treat that as "no values", never as an error.

mod fast_field;
mod memory;

pub use fast_field::{shard_from_index, TantivySegment};
pub use memory::{MemorySegment, MemorySegmentBuilder};

use crate::value::Value;
use std::sync::Arc;

pub type DocId = u32;

/// Per-field column of (possibly multi-valued) document values.
pub trait ValueColumn: Send + Sync {
    /// Append the values stored for `doc` to `out`, in storage order.
    fn values_for_doc(&self, doc: DocId, out: &mut Vec<Value>);
}

pub trait Segment: Send + Sync {
    fn segment_ord(&self) -> u32;

    /// Upper bound (exclusive) on document ids in this segment.
    fn max_doc(&self) -> DocId;

    fn is_alive(&self, doc: DocId) -> bool;

    fn live_docs(&self) -> Box<dyn Iterator<Item = DocId> + '_> {
        Box::new((0..self.max_doc()).filter(move |doc| self.is_alive(*doc)))
    }

    fn num_docs(&self) -> u32 {
        self.live_docs().count() as u32
    }

    /// Column for `field`, or `None` when the field is unmapped here.
    fn column(&self, field: &str) -> Option<Arc<dyn ValueColumn>>;

    fn get_values(&self, doc: DocId, field: &str) -> Vec<Value> {
        let mut out = Vec::new();
        if let Some(column) = self.column(field) {
            column.values_for_doc(doc, &mut out);
        }
        out
    }
}

/// One independently collected partition of a searchable collection.
#[derive(Clone)]
pub struct Shard {
    name: String,
    segments: Vec<Arc<dyn Segment>>,
}

impl Shard {
    pub fn new(name: impl Into<String>, segments: Vec<Arc<dyn Segment>>) -> Self {
        Self {
            name: name.into(),
            segments,
        }
    }

    /// A shard of an index that holds no documents and maps no fields.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn segments(&self) -> &[Arc<dyn Segment>] {
        &self.segments
    }

    pub fn num_docs(&self) -> u64 {
        self.segments.iter().map(|s| s.num_docs() as u64).sum()
    }
}

impl std::fmt::Debug for Shard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shard")
            .field("name", &self.name)
            .field("segments", &self.segments.len())
            .finish()
    }
}
