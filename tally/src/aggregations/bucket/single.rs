use crate::aggregations::agg_trait::ensure_ordinal;
use crate::aggregations::collector::{children_fruits, AggCollector};
use crate::aggregations::reduce::AggFruit;
use crate::query::{BoundQuery, Query};
use crate::segment::{DocId, Segment};
use crate::value::Value;
use crate::Result;

/// Collector of a global or filter bucket.
///
/// Without a filter every document handed in is a member (global). With a
/// filter, documents failing it are dropped, which can leave the bucket
/// empty; its sub-aggregations then still report their empty values.
pub struct SingleBucketCollector<'p> {
    filter: Option<&'p Query>,
    bound: Option<BoundQuery>,
    doc_counts: Vec<u64>,
    children: Vec<AggCollector<'p>>,
    scratch: Vec<Value>,
}

impl<'p> SingleBucketCollector<'p> {
    pub fn new(filter: Option<&'p Query>, children: Vec<AggCollector<'p>>) -> Self {
        Self {
            filter,
            bound: None,
            doc_counts: Vec::new(),
            children,
            scratch: Vec::new(),
        }
    }

    pub fn bind_segment(&mut self, segment: &dyn Segment) -> Result<()> {
        self.bound = self.filter.map(|q| q.bind(segment));
        for child in &mut self.children {
            child.bind_segment(segment)?;
        }
        Ok(())
    }

    pub fn collect(&mut self, doc: DocId, ordinal: usize) -> Result<()> {
        if let Some(bound) = &self.bound {
            if !bound.matches(doc, &mut self.scratch) {
                return Ok(());
            }
        }
        ensure_ordinal(&mut self.doc_counts, ordinal, 0);
        self.doc_counts[ordinal] += 1;
        for child in &mut self.children {
            child.collect(doc, ordinal)?;
        }
        Ok(())
    }

    pub fn close(&mut self) {
        self.bound = None;
        for child in &mut self.children {
            child.close();
        }
    }

    pub fn fruit(&self, ordinal: usize) -> AggFruit {
        AggFruit::SingleBucket {
            doc_count: self.doc_counts.get(ordinal).copied().unwrap_or(0),
            sub: children_fruits(&self.children, ordinal),
        }
    }
}
