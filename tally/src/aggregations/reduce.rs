//! Partial aggregation results and how they combine.
//!
//! Every shard pass produces an [`AggFruit`] tree per top-level aggregation.
//! Trees for the same request merge by summing document counts and metric
//! partials of buckets that share a name or key; term bucket sets are
//! unioned. Merging is commutative and associative, so shards can be reduced
//! in any order or grouping.

use crate::aggregations::metric::MetricFruit;
use crate::value::BucketKey;
use std::collections::BTreeMap;

pub type FruitMap = BTreeMap<String, AggFruit>;

#[derive(Debug, Clone, PartialEq)]
pub enum AggFruit {
    Metric(MetricFruit),
    SingleBucket { doc_count: u64, sub: FruitMap },
    Terms { buckets: BTreeMap<BucketKey, TermsFruitBucket> },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TermsFruitBucket {
    pub doc_count: u64,
    pub sub: FruitMap,
}

impl AggFruit {
    pub fn merge(&mut self, other: AggFruit) {
        match (self, other) {
            (AggFruit::Metric(a), AggFruit::Metric(b)) => a.merge(b),
            (
                AggFruit::SingleBucket { doc_count, sub },
                AggFruit::SingleBucket {
                    doc_count: other_count,
                    sub: other_sub,
                },
            ) => {
                *doc_count += other_count;
                merge_fruit_maps(sub, other_sub);
            }
            (AggFruit::Terms { buckets }, AggFruit::Terms { buckets: other }) => {
                for (key, bucket) in other {
                    match buckets.get_mut(&key) {
                        Some(existing) => {
                            existing.doc_count += bucket.doc_count;
                            merge_fruit_maps(&mut existing.sub, bucket.sub);
                        }
                        None => {
                            buckets.insert(key, bucket);
                        }
                    }
                }
            }
            (this, other) => {
                tracing::warn!(?this, ?other, "ignoring merge of mismatched aggregation fruits");
            }
        }
    }
}

pub fn merge_fruit_maps(acc: &mut FruitMap, other: FruitMap) {
    for (name, fruit) in other {
        match acc.get_mut(&name) {
            Some(existing) => existing.merge(fruit),
            None => {
                acc.insert(name, fruit);
            }
        }
    }
}

/// Partial result of one shard pass (or of several, once reduced).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShardFruit {
    pub total_hits: u64,
    /// Set when any contributing pass was stopped early.
    pub partial: bool,
    pub aggs: FruitMap,
}

impl ShardFruit {
    pub fn merge(&mut self, other: ShardFruit) {
        self.total_hits += other.total_hits;
        self.partial |= other.partial;
        merge_fruit_maps(&mut self.aggs, other.aggs);
    }
}

/// Combine partial results into one.
pub fn reduce(partials: impl IntoIterator<Item = ShardFruit>) -> ShardFruit {
    partials
        .into_iter()
        .fold(ShardFruit::default(), |mut acc, fruit| {
            acc.merge(fruit);
            acc
        })
}
