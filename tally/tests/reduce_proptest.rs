//! Property-based tests for shard reduction.
//!
//! Splitting the same documents over any number of shards, and merging the
//! shard partials in any order, must give the result of a single shard.

use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::collections::BTreeMap;
use tally::aggregations::reduce::{self, AggFruit, FruitMap, ShardFruit, TermsFruitBucket};
use tally::aggregations::{
    AggregationRequest, BucketOrder, PreparedRequest, SearchRequest, ValueSourceSpec,
};
use tally::config::EngineConfig;
use tally::query::Query;
use tally::script::ScriptEngines;
use tally::segment::{MemorySegment, Segment, Shard};
use tally::value::BucketKey;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Doc {
    value: Option<i64>,
    tags: Vec<i64>,
}

fn doc_strategy() -> impl Strategy<Value = Doc> {
    (
        prop::option::of(0i64..6),
        prop::collection::vec(0i64..4, 0..3),
    )
        .prop_map(|(value, tags)| Doc { value, tags })
}

fn shard(name: &str, docs: &[Doc]) -> Shard {
    let json: Vec<_> = docs
        .iter()
        .map(|d| match d.value {
            Some(v) => json!({"value": v, "tags": d.tags}),
            None => json!({"tags": d.tags}),
        })
        .collect();
    let segment = MemorySegment::builder(0)
        .with_documents(&json)
        .unwrap()
        .build();
    Shard::new(name, vec![Arc::new(segment) as Arc<dyn Segment>])
}

fn request() -> SearchRequest {
    SearchRequest::new(Query::exists("value"))
        .aggregation(AggregationRequest::value_count(
            "count",
            ValueSourceSpec::field("tags"),
        ))
        .aggregation(
            AggregationRequest::global("global")
                .sub_aggregation(AggregationRequest::avg("avg", ValueSourceSpec::field("value"))),
        )
        .aggregation(
            AggregationRequest::terms("by_tag", ValueSourceSpec::field("tags"))
                .order(BucketOrder::key(true))
                .size(10)
                .sub_aggregation(AggregationRequest::sum("sum", ValueSourceSpec::field("value")))
                .sub_aggregation(
                    AggregationRequest::filter("low", Query::term("value", 1))
                        .sub_aggregation(AggregationRequest::max(
                            "max",
                            ValueSourceSpec::field("tags"),
                        )),
                ),
        )
}

fn prepared() -> PreparedRequest {
    PreparedRequest::prepare(&request(), &ScriptEngines::new(), &EngineConfig::default()).unwrap()
}

fn partials(prepared: &PreparedRequest, shards: &[Shard]) -> Vec<ShardFruit> {
    let cancel = CancellationToken::new();
    shards
        .iter()
        .map(|s| prepared.collect_shard(s, 1_000, &cancel).unwrap())
        .collect()
}

/// Cut `docs` at the given (unsorted, possibly repeated) positions.
fn split(docs: &[Doc], cuts: &[usize]) -> Vec<Shard> {
    let mut cuts: Vec<usize> = cuts.iter().map(|c| c % (docs.len() + 1)).collect();
    cuts.push(0);
    cuts.push(docs.len());
    cuts.sort_unstable();
    cuts.dedup();
    cuts.windows(2)
        .enumerate()
        .map(|(i, w)| shard(&format!("shard-{}", i), &docs[w[0]..w[1]]))
        .collect()
}

/// Integer and float keys clustered around +-2^53, where `i64 as f64` rounds.
fn key_strategy() -> impl Strategy<Value = BucketKey> {
    let p53 = 1i64 << 53;
    prop_oneof![
        (-3i64..=3, any::<bool>()).prop_map(move |(d, neg)| {
            BucketKey::Long(if neg { -p53 - d } else { p53 + d })
        }),
        (-3i64..=3, any::<bool>()).prop_map(move |(d, neg)| {
            let v = if neg { -p53 - d } else { p53 + d };
            BucketKey::Double(v as f64)
        }),
        (0i64..4).prop_map(BucketKey::Long),
        (0i64..4).prop_map(|v| BucketKey::Double(v as f64 + 0.5)),
    ]
}

fn terms_fruit(keys: &[BucketKey]) -> ShardFruit {
    let mut buckets = BTreeMap::new();
    for key in keys {
        buckets
            .entry(key.clone())
            .or_insert_with(TermsFruitBucket::default)
            .doc_count += 1;
    }
    ShardFruit {
        total_hits: keys.len() as u64,
        partial: false,
        aggs: FruitMap::from([("terms".to_string(), AggFruit::Terms { buckets })]),
    }
}

/// Doc counts in key order; the surviving key variant may differ between
/// merge orders, the bucket boundaries may not.
fn bucket_counts(fruit: &ShardFruit) -> Vec<(Option<f64>, u64)> {
    match fruit.aggs.get("terms") {
        Some(AggFruit::Terms { buckets }) => buckets
            .iter()
            .map(|(k, b)| (k.as_f64(), b.doc_count))
            .collect(),
        _ => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn split_shards_match_single_shard(
        docs in prop::collection::vec(doc_strategy(), 0..40),
        cuts in prop::collection::vec(0usize..64, 0..4),
    ) {
        let prepared = prepared();
        let whole = prepared.finalize(&reduce::reduce(partials(&prepared, &[shard("all", &docs)])));
        let pieces = prepared.finalize(&reduce::reduce(partials(&prepared, &split(&docs, &cuts))));
        prop_assert_eq!(whole, pieces);
    }

    #[test]
    fn merge_order_does_not_matter(
        docs in prop::collection::vec(doc_strategy(), 1..40),
        cuts in prop::collection::vec(0usize..64, 1..4),
    ) {
        let prepared = prepared();
        let parts = partials(&prepared, &split(&docs, &cuts));

        let forward = reduce::reduce(parts.clone());
        let backward = reduce::reduce(parts.iter().rev().cloned());
        prop_assert_eq!(&forward, &backward);

        // ((a + b) + rest) == (a + (b + rest))
        if parts.len() >= 2 {
            let mut left = parts[0].clone();
            left.merge(parts[1].clone());
            let left = reduce::reduce(std::iter::once(left).chain(parts[2..].iter().cloned()));

            let right_tail = reduce::reduce(parts[1..].iter().cloned());
            let mut right = parts[0].clone();
            right.merge(right_tail);
            prop_assert_eq!(left, right);
        }
    }

    #[test]
    fn mixed_numeric_keys_merge_associatively(
        a in prop::collection::vec(key_strategy(), 0..6),
        b in prop::collection::vec(key_strategy(), 0..6),
        c in prop::collection::vec(key_strategy(), 0..6),
    ) {
        let (a, b, c) = (terms_fruit(&a), terms_fruit(&b), terms_fruit(&c));

        let mut left = a.clone();
        left.merge(b.clone());
        left.merge(c.clone());

        let mut tail = b.clone();
        tail.merge(c.clone());
        let mut right = a.clone();
        right.merge(tail);

        let mut swapped = c;
        swapped.merge(a);
        swapped.merge(b);

        prop_assert_eq!(bucket_counts(&left), bucket_counts(&right));
        prop_assert_eq!(bucket_counts(&left), bucket_counts(&swapped));
    }
}
