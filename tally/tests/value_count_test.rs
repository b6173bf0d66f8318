//! End-to-end value_count aggregations over in-memory shards.

use serde_json::json;
use std::sync::Arc;
use tally::aggregations::{
    AggregationExecutor, AggregationRequest, AggregationResponse, BucketOrder, PropertyValue,
    SearchRequest, ValueSourceSpec,
};
use tally::config::EngineConfig;
use tally::query::Query;
use tally::script::{FieldValueScriptEngine, ScriptEngines, ScriptSpec};
use tally::segment::{DocId, MemorySegment, Segment, Shard, ValueColumn};
use tally::value::BucketKey;
use tally::Error;
use tokio_util::sync::CancellationToken;

const NUM_DOCS: i64 = 10;

/// Documents `{value: i + 1, values: [i + 2, i + 3]}` for i in 0..10, split
/// over two segments.
fn idx() -> Shard {
    let docs: Vec<_> = (0..NUM_DOCS)
        .map(|i| json!({"value": i + 1, "values": [i + 2, i + 3]}))
        .collect();
    let first = MemorySegment::builder(0)
        .with_documents(&docs[..6])
        .unwrap()
        .build();
    let second = MemorySegment::builder(1)
        .with_documents(&docs[6..])
        .unwrap()
        .build();
    Shard::new(
        "idx",
        vec![Arc::new(first) as Arc<dyn Segment>, Arc::new(second)],
    )
}

fn idx_unmapped() -> Shard {
    Shard::empty("idx_unmapped")
}

fn executor() -> AggregationExecutor {
    executor_with(EngineConfig::default())
}

fn executor_with(config: EngineConfig) -> AggregationExecutor {
    let scripts = ScriptEngines::new().with_engine(Arc::new(FieldValueScriptEngine));
    AggregationExecutor::new(scripts, config)
}

fn count_of(field: &str) -> AggregationRequest {
    AggregationRequest::value_count("count", ValueSourceSpec::field(field))
}

fn field_script(source: &str) -> ScriptSpec {
    ScriptSpec::new(FieldValueScriptEngine::NAME, source)
}

fn run(shards: &[Shard], agg: AggregationRequest) -> AggregationResponse {
    executor()
        .execute(&SearchRequest::new(Query::MatchAll).aggregation(agg), shards)
        .unwrap()
}

fn count_value(response: &AggregationResponse) -> Option<f64> {
    response.aggregations.get("count").and_then(|c| c.value())
}

#[test]
fn test_unmapped() {
    let response = run(&[idx_unmapped()], count_of("value"));
    assert_eq!(response.total_hits, 0);
    assert_eq!(count_value(&response), Some(0.0));
}

#[test]
fn test_single_valued_field() {
    let response = run(&[idx()], count_of("value"));
    assert_eq!(response.total_hits, 10);
    assert_eq!(count_value(&response), Some(10.0));
}

#[test]
fn test_multi_valued_field() {
    let response = run(&[idx()], count_of("values"));
    assert_eq!(count_value(&response), Some(20.0));
}

#[test]
fn test_partially_unmapped() {
    let response = run(&[idx(), idx_unmapped()], count_of("value"));
    assert_eq!(response.total_hits, 10);
    assert_eq!(count_value(&response), Some(10.0));
}

#[test]
fn test_missing_field_counts_zero() {
    let response = run(&[idx()], count_of("does_not_exist"));
    assert_eq!(count_value(&response), Some(0.0));
}

#[test]
fn test_single_valued_field_with_query() {
    let request = SearchRequest::new(Query::term("value", 3)).aggregation(count_of("value"));
    let response = executor().execute(&request, &[idx()]).unwrap();
    assert_eq!(response.total_hits, 1);
    assert_eq!(count_value(&response), Some(1.0));
}

#[test]
fn test_single_valued_field_get_property() {
    let request = SearchRequest::new(Query::MatchAll)
        .aggregation(AggregationRequest::global("global").sub_aggregation(count_of("value")));
    let response = executor().execute(&request, &[idx()]).unwrap();

    let global = response.aggregations.get("global").unwrap();
    assert_eq!(global.doc_count(), Some(10));
    let sub = global.aggregations().unwrap();
    assert_eq!(sub.len(), 1);

    let count = sub.get("count").unwrap();
    assert_eq!(count.name, "count");
    assert_eq!(count.value(), Some(10.0));
    assert_eq!(global.property("count"), Some(PropertyValue::Aggregation(count)));
    assert_eq!(
        global.property("count.value").and_then(|p| p.as_f64()),
        Some(10.0)
    );
    assert_eq!(count.property("value").and_then(|p| p.as_f64()), Some(10.0));
}

#[test]
fn test_global_ignores_query() {
    let request = SearchRequest::new(Query::MatchNone)
        .aggregation(AggregationRequest::global("global").sub_aggregation(count_of("value")));
    let response = executor().execute(&request, &[idx()]).unwrap();

    assert_eq!(response.total_hits, 0);
    let global = response.aggregations.get("global").unwrap();
    assert_eq!(global.doc_count(), Some(10));
    assert_eq!(
        response
            .aggregations
            .property("global.count.value")
            .and_then(|p| p.as_f64()),
        Some(10.0)
    );
}

#[test]
fn test_single_valued_script() {
    let agg = AggregationRequest::value_count(
        "count",
        ValueSourceSpec::Script(field_script("value")),
    );
    assert_eq!(count_value(&run(&[idx()], agg)), Some(10.0));
}

#[test]
fn test_multi_valued_script() {
    let agg = AggregationRequest::value_count(
        "count",
        ValueSourceSpec::Script(field_script("values")),
    );
    assert_eq!(count_value(&run(&[idx()], agg)), Some(20.0));
}

#[test]
fn test_single_valued_script_with_params() {
    let script = field_script("").with_param("s", "value");
    assert_eq!(script.field_override.as_deref(), Some("value"));
    let agg = AggregationRequest::value_count("count", ValueSourceSpec::Script(script));
    assert_eq!(count_value(&run(&[idx()], agg)), Some(10.0));
}

#[test]
fn test_multi_valued_script_with_params() {
    let script = field_script("value").with_param("s", "values");
    let agg = AggregationRequest::value_count("count", ValueSourceSpec::Script(script));
    assert_eq!(count_value(&run(&[idx()], agg)), Some(20.0));
}

#[test]
fn test_script_from_json_request() {
    let request: SearchRequest = serde_json::from_value(json!({
        "aggs": [{
            "name": "count",
            "value_count": {"script": {"lang": "field_value", "source": "", "params": {"s": "values"}}}
        }]
    }))
    .unwrap();
    let response = executor().execute(&request, &[idx()]).unwrap();
    assert_eq!(count_value(&response), Some(20.0));
}

#[test]
fn test_ordered_by_empty_filter_count() {
    let request = SearchRequest::new(Query::MatchAll).aggregation(
        AggregationRequest::terms("terms", ValueSourceSpec::field("value"))
            .order(BucketOrder::aggregation("filter>count", true).unwrap())
            .sub_aggregation(
                AggregationRequest::filter("filter", Query::term("value", 100))
                    .sub_aggregation(count_of("value")),
            ),
    );

    let first = executor().execute(&request, &[idx()]).unwrap();
    let terms = first.aggregations.get("terms").unwrap();
    let buckets = terms.buckets().unwrap();
    assert_eq!(buckets.len(), 10);

    for (i, bucket) in buckets.iter().enumerate() {
        assert_eq!(bucket.key, BucketKey::Long(i as i64 + 1));
        assert_eq!(bucket.doc_count, 1);
        let filter = bucket.aggregations.get("filter").unwrap();
        assert_eq!(filter.doc_count(), Some(0));
        let count = filter.aggregations().and_then(|a| a.get("count")).unwrap();
        assert_eq!(count.value(), Some(0.0));
    }

    // ties keep the same order on every run
    for _ in 0..5 {
        let again = executor().execute(&request, &[idx()]).unwrap();
        assert_eq!(again, first);
    }
}

#[test]
fn test_ordered_by_sub_count_desc() {
    let request = SearchRequest::new(Query::MatchAll).aggregation(
        AggregationRequest::terms("terms", ValueSourceSpec::field("values"))
            .order(BucketOrder::aggregation("count", false).unwrap())
            .size(3)
            .sub_aggregation(count_of("value")),
    );
    let response = executor().execute(&request, &[idx()]).unwrap();
    let buckets = response.aggregations.get("terms").unwrap().buckets().unwrap();

    // values 3..=11 appear twice, 2 and 12 once
    let keys: Vec<_> = buckets.iter().map(|b| b.key.clone()).collect();
    assert_eq!(
        keys,
        vec![BucketKey::Long(3), BucketKey::Long(4), BucketKey::Long(5)]
    );
    assert!(buckets.iter().all(|b| b.doc_count == 2));
}

#[test]
fn test_compile_failure_before_collection() {
    let agg = AggregationRequest::value_count(
        "count",
        ValueSourceSpec::Script(field_script("")),
    );
    let request = SearchRequest::new(Query::MatchAll).aggregation(agg);
    let result = executor().execute(&request, &[idx()]);
    assert!(matches!(result, Err(Error::ScriptCompile(_))));
}

#[test]
fn test_unknown_script_lang() {
    let agg = AggregationRequest::value_count(
        "count",
        ValueSourceSpec::Script(ScriptSpec::new("painless", "doc['value']")),
    );
    let request = SearchRequest::new(Query::MatchAll).aggregation(agg);
    let result = executor().execute(&request, &[idx()]);
    assert!(matches!(result, Err(Error::ScriptCompile(_))));
}

#[test]
fn test_cancelled_collection_is_partial() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let request = SearchRequest::new(Query::MatchAll).aggregation(count_of("value"));
    let response = executor()
        .execute_with_cancel(&request, &[idx()], &cancel)
        .unwrap();
    assert!(response.partial);
    assert_eq!(response.total_hits, 0);
    assert_eq!(count_value(&response), Some(0.0));
}

/// Segment that fires `cancel` when its live-doc iterator reaches `stop_at`.
struct StoppingSegment {
    inner: MemorySegment,
    stop_at: DocId,
    cancel: CancellationToken,
}

impl Segment for StoppingSegment {
    fn segment_ord(&self) -> u32 {
        self.inner.segment_ord()
    }

    fn max_doc(&self) -> DocId {
        self.inner.max_doc()
    }

    fn is_alive(&self, doc: DocId) -> bool {
        self.inner.is_alive(doc)
    }

    fn live_docs(&self) -> Box<dyn Iterator<Item = DocId> + '_> {
        let cancel = self.cancel.clone();
        let stop_at = self.stop_at;
        Box::new(self.inner.live_docs().inspect(move |doc| {
            if *doc >= stop_at {
                cancel.cancel();
            }
        }))
    }

    fn column(&self, field: &str) -> Option<Arc<dyn ValueColumn>> {
        self.inner.column(field)
    }
}

#[test]
fn test_stopped_mid_pass_keeps_consistent_counts() {
    let docs: Vec<_> = (0..NUM_DOCS)
        .map(|i| json!({"value": i + 1, "values": [i + 2, i + 3]}))
        .collect();
    let cancel = CancellationToken::new();
    let segment = StoppingSegment {
        inner: MemorySegment::builder(0).with_documents(&docs).unwrap().build(),
        stop_at: 4,
        cancel: cancel.clone(),
    };
    let shard = Shard::new("idx", vec![Arc::new(segment) as Arc<dyn Segment>]);

    let request = SearchRequest::new(Query::MatchAll)
        .aggregation(count_of("values"))
        .aggregation(AggregationRequest::global("global").sub_aggregation(count_of("values")))
        .aggregation(
            AggregationRequest::terms("terms", ValueSourceSpec::field("value"))
                .sub_aggregation(count_of("values")),
        );
    let response = executor()
        .execute_with_cancel(&request, &[shard], &cancel)
        .unwrap();

    assert!(response.partial);
    assert_eq!(response.total_hits, 4);
    assert_eq!(count_value(&response), Some(8.0));

    let global = response.aggregations.get("global").unwrap();
    assert_eq!(global.doc_count(), Some(4));
    assert_eq!(
        global.property("count.value").and_then(|p| p.as_f64()),
        count_value(&response)
    );

    let buckets = response.aggregations.get("terms").unwrap().buckets().unwrap();
    let keys: Vec<_> = buckets.iter().map(|b| b.key.clone()).collect();
    assert_eq!(keys, (1..=4).map(BucketKey::Long).collect::<Vec<_>>());
    for bucket in buckets {
        assert_eq!(bucket.doc_count, 1);
        assert_eq!(bucket.aggregations.get("count").and_then(|c| c.value()), Some(2.0));
    }
}

#[test]
fn test_max_buckets() {
    let config = EngineConfig {
        max_buckets: 5,
        ..EngineConfig::default()
    };
    let request = SearchRequest::new(Query::MatchAll)
        .aggregation(AggregationRequest::terms("terms", ValueSourceSpec::field("value")));
    let result = executor_with(config).execute(&request, &[idx()]);
    assert!(matches!(result, Err(Error::InvalidRequest(_))));
}

#[test]
fn test_parallel_matches_sequential() {
    let shards = [idx(), idx_unmapped(), idx()];
    let request = SearchRequest::new(Query::MatchAll)
        .aggregation(count_of("values"))
        .aggregation(
            AggregationRequest::terms("terms", ValueSourceSpec::field("value"))
                .sub_aggregation(AggregationRequest::sum("sum", ValueSourceSpec::field("values"))),
        );

    let parallel = executor().execute(&request, &shards).unwrap();
    let sequential = executor_with(EngineConfig {
        parallel_shards: false,
        ..EngineConfig::default()
    })
    .execute(&request, &shards)
    .unwrap();

    assert_eq!(parallel, sequential);
    assert_eq!(parallel.total_hits, 20);
    assert_eq!(count_value(&parallel), Some(40.0));
}

#[test]
fn test_response_json() {
    let request = SearchRequest::new(Query::MatchAll)
        .aggregation(AggregationRequest::global("global").sub_aggregation(count_of("value")));
    let response = executor().execute(&request, &[idx()]).unwrap();
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({
            "total_hits": 10,
            "partial": false,
            "aggregations": {"global": {"doc_count": 10, "count": {"value": 10.0}}}
        })
    );
}
