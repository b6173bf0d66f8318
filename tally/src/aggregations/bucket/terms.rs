use crate::aggregations::agg_trait::ensure_ordinal;
use crate::aggregations::collector::{children_fruits, finalize_children, AggCollector, PreparedAggregation};
use crate::aggregations::order::{sort_buckets, BucketOrder};
use crate::aggregations::reduce::{AggFruit, TermsFruitBucket};
use crate::aggregations::types::{Bucket, TermsSpec};
use crate::aggregations::value_source::{ResolvedSource, ValueSource};
use crate::config::EngineConfig;
use crate::script::ScriptEngines;
use crate::segment::{DocId, Segment};
use crate::value::{BucketKey, Value};
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug)]
pub struct PreparedTerms {
    source: ResolvedSource,
    size: usize,
    min_doc_count: u64,
    orders: Vec<BucketOrder>,
}

impl PreparedTerms {
    pub fn prepare(spec: &TermsSpec, scripts: &ScriptEngines, config: &EngineConfig) -> Result<Self> {
        let orders = if spec.order.is_empty() {
            vec![BucketOrder::count(false)]
        } else {
            spec.order.clone()
        };
        Ok(Self {
            source: spec.source.resolve(scripts)?,
            size: spec.size.unwrap_or(config.default_terms_size),
            min_doc_count: spec.min_doc_count,
            orders,
        })
    }

    /// Build the final, ordered and truncated bucket list.
    pub fn finalize(
        &self,
        buckets: Option<&BTreeMap<BucketKey, TermsFruitBucket>>,
        children: &[PreparedAggregation],
    ) -> Vec<Bucket> {
        let Some(buckets) = buckets else {
            return Vec::new();
        };

        // BTreeMap iteration is key order, which sorting keeps for ties.
        let mut result: Vec<Bucket> = buckets
            .iter()
            .filter(|(_, b)| b.doc_count >= self.min_doc_count)
            .map(|(key, b)| Bucket {
                key: key.clone(),
                doc_count: b.doc_count,
                aggregations: finalize_children(children, Some(&b.sub)),
            })
            .collect();

        sort_buckets(&mut result, &self.orders);
        result.truncate(self.size);
        result
    }
}

/// Partitions documents into one bucket per distinct value of the source.
///
/// A document with several values joins each distinct value's bucket once.
pub struct TermsCollector<'p> {
    prepared: &'p PreparedTerms,
    bound: Option<ValueSource>,
    /// parent ordinal -> term -> bucket ordinal
    ordinals: HashMap<usize, BTreeMap<BucketKey, usize>>,
    next_ordinal: usize,
    max_buckets: usize,
    doc_counts: Vec<u64>,
    children: Vec<AggCollector<'p>>,
    values: Vec<Value>,
    keys: Vec<BucketKey>,
}

impl<'p> TermsCollector<'p> {
    pub fn new(prepared: &'p PreparedTerms, children: Vec<AggCollector<'p>>, max_buckets: usize) -> Self {
        Self {
            prepared,
            bound: None,
            ordinals: HashMap::new(),
            next_ordinal: 0,
            max_buckets,
            doc_counts: Vec::new(),
            children,
            values: Vec::new(),
            keys: Vec::new(),
        }
    }

    pub fn bind_segment(&mut self, segment: &dyn Segment) -> Result<()> {
        self.bound = Some(self.prepared.source.for_segment(segment)?);
        for child in &mut self.children {
            child.bind_segment(segment)?;
        }
        Ok(())
    }

    pub fn collect(&mut self, doc: DocId, parent: usize) -> Result<()> {
        let source = self
            .bound
            .as_mut()
            .ok_or_else(|| Error::InvalidRequest("terms value source not bound".to_string()))?;
        source.values_for_doc(doc, &mut self.values)?;

        let mut keys = std::mem::take(&mut self.keys);
        keys.clear();
        keys.extend(self.values.iter().map(BucketKey::from_value));
        keys.sort();
        keys.dedup();

        let mut outcome = Ok(());
        for key in keys.drain(..) {
            outcome = self.collect_in_bucket(doc, parent, key);
            if outcome.is_err() {
                break;
            }
        }
        self.keys = keys;
        outcome
    }

    fn collect_in_bucket(&mut self, doc: DocId, parent: usize, key: BucketKey) -> Result<()> {
        let ordinal = self.bucket_ordinal(parent, key)?;
        ensure_ordinal(&mut self.doc_counts, ordinal, 0);
        self.doc_counts[ordinal] += 1;
        for child in &mut self.children {
            child.collect(doc, ordinal)?;
        }
        Ok(())
    }

    fn bucket_ordinal(&mut self, parent: usize, key: BucketKey) -> Result<usize> {
        let terms = self.ordinals.entry(parent).or_default();
        if let Some(ordinal) = terms.get(&key) {
            return Ok(*ordinal);
        }
        if self.next_ordinal >= self.max_buckets {
            return Err(Error::InvalidRequest(format!(
                "too many buckets: terms aggregation exceeded max_buckets [{}]",
                self.max_buckets
            )));
        }
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        terms.insert(key, ordinal);
        Ok(ordinal)
    }

    pub fn close(&mut self) {
        self.bound = None;
        for child in &mut self.children {
            child.close();
        }
    }

    pub fn fruit(&self, parent: usize) -> AggFruit {
        let buckets = self
            .ordinals
            .get(&parent)
            .map(|terms| {
                terms
                    .iter()
                    .map(|(key, &ordinal)| {
                        (
                            key.clone(),
                            TermsFruitBucket {
                                doc_count: self.doc_counts.get(ordinal).copied().unwrap_or(0),
                                sub: children_fruits(&self.children, ordinal),
                            },
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();
        AggFruit::Terms { buckets }
    }
}
