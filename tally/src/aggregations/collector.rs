//! Collector tree for one shard pass.
//!
//! A request is prepared once ([`PreparedAggregation`]): scripts are compiled
//! and order paths checked. Each shard pass then builds its own
//! [`AggCollector`] tree from it. Collectors address per-bucket state by
//! ordinal: a top-level collector only sees ordinal 0, single-bucket
//! collectors hand their own ordinal down unchanged and terms collectors hand
//! down one fresh ordinal per (parent ordinal, term).

use crate::aggregations::agg_trait::{CollectorState, MetricAccumulator};
use crate::aggregations::bucket::{PreparedTerms, SingleBucketCollector, TermsCollector};
use crate::aggregations::metric::{MetricFruit, MetricKind};
use crate::aggregations::reduce::{AggFruit, FruitMap};
use crate::aggregations::types::{
    AggregationRequest, AggregationResult, AggregationType, AggregationValue, Aggregations,
    SingleBucket,
};
use crate::aggregations::value_source::{ResolvedSource, ValueSource};
use crate::config::EngineConfig;
use crate::query::Query;
use crate::script::ScriptEngines;
use crate::segment::{DocId, Segment};
use crate::value::Value;
use crate::{Error, Result};

/// An aggregation definition resolved for execution. Shared by all shards.
#[derive(Debug)]
pub struct PreparedAggregation {
    pub(crate) name: String,
    pub(crate) kind: PreparedKind,
    pub(crate) children: Vec<PreparedAggregation>,
}

#[derive(Debug)]
pub(crate) enum PreparedKind {
    Metric {
        kind: MetricKind,
        source: ResolvedSource,
    },
    Global,
    Filter(Query),
    Terms(PreparedTerms),
}

impl PreparedAggregation {
    pub fn prepare(
        req: &AggregationRequest,
        scripts: &ScriptEngines,
        config: &EngineConfig,
    ) -> Result<Self> {
        let metric = |kind, source: &crate::aggregations::ValueSourceSpec| -> Result<PreparedKind> {
            Ok(PreparedKind::Metric {
                kind,
                source: source.resolve(scripts)?,
            })
        };

        let kind = match &req.agg_type {
            AggregationType::ValueCount(source) => metric(MetricKind::ValueCount, source)?,
            AggregationType::Sum(source) => metric(MetricKind::Sum, source)?,
            AggregationType::Avg(source) => metric(MetricKind::Avg, source)?,
            AggregationType::Min(source) => metric(MetricKind::Min, source)?,
            AggregationType::Max(source) => metric(MetricKind::Max, source)?,
            AggregationType::Global {} => PreparedKind::Global,
            AggregationType::Filter(query) => PreparedKind::Filter(query.clone()),
            AggregationType::Terms(spec) => {
                PreparedKind::Terms(PreparedTerms::prepare(spec, scripts, config)?)
            }
        };

        let children = req
            .aggs
            .iter()
            .map(|child| Self::prepare(child, scripts, config))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: req.name.clone(),
            kind,
            children,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Global aggregations see every live document, whatever the query.
    pub fn ignores_query(&self) -> bool {
        matches!(self.kind, PreparedKind::Global)
    }

    pub fn collector(&self, max_buckets: usize) -> AggCollector<'_> {
        let children = || {
            self.children
                .iter()
                .map(|c| c.collector(max_buckets))
                .collect::<Vec<_>>()
        };
        let kind = match &self.kind {
            PreparedKind::Metric { kind, source } => CollectorKind::Metric(MetricCollector {
                source,
                bound: None,
                accumulator: kind.accumulator(),
                values: Vec::new(),
            }),
            PreparedKind::Global => {
                CollectorKind::SingleBucket(SingleBucketCollector::new(None, children()))
            }
            PreparedKind::Filter(query) => {
                CollectorKind::SingleBucket(SingleBucketCollector::new(Some(query), children()))
            }
            PreparedKind::Terms(terms) => {
                CollectorKind::Terms(TermsCollector::new(terms, children(), max_buckets))
            }
        };
        AggCollector {
            prepared: self,
            state: CollectorState::Unopened,
            kind,
        }
    }

    /// Turn a reduced partial into the final result. A missing partial
    /// (no shard produced one) yields the empty result.
    pub fn finalize(&self, fruit: Option<&AggFruit>) -> AggregationResult {
        let value = match (&self.kind, fruit) {
            (PreparedKind::Metric { .. }, Some(AggFruit::Metric(m))) => {
                AggregationValue::Single(m.value())
            }
            (PreparedKind::Metric { kind, .. }, _) => {
                AggregationValue::Single(MetricFruit::empty(*kind).value())
            }
            (PreparedKind::Global | PreparedKind::Filter(_), fruit) => {
                let (doc_count, sub) = match fruit {
                    Some(AggFruit::SingleBucket { doc_count, sub }) => (*doc_count, Some(sub)),
                    _ => (0, None),
                };
                AggregationValue::SingleBucket(SingleBucket {
                    doc_count,
                    aggregations: finalize_children(&self.children, sub),
                })
            }
            (PreparedKind::Terms(terms), fruit) => {
                let buckets = match fruit {
                    Some(AggFruit::Terms { buckets }) => Some(buckets),
                    _ => None,
                };
                AggregationValue::Buckets(terms.finalize(buckets, &self.children))
            }
        };
        AggregationResult {
            name: self.name.clone(),
            value,
        }
    }
}

pub(crate) fn finalize_children(
    children: &[PreparedAggregation],
    sub: Option<&FruitMap>,
) -> Aggregations {
    Aggregations::new(
        children
            .iter()
            .map(|child| child.finalize(sub.and_then(|m| m.get(&child.name))))
            .collect(),
    )
}

/// Collector for one aggregation node during one shard pass.
pub struct AggCollector<'p> {
    prepared: &'p PreparedAggregation,
    state: CollectorState,
    kind: CollectorKind<'p>,
}

enum CollectorKind<'p> {
    Metric(MetricCollector<'p>),
    SingleBucket(SingleBucketCollector<'p>),
    Terms(TermsCollector<'p>),
}

struct MetricCollector<'p> {
    source: &'p ResolvedSource,
    bound: Option<ValueSource>,
    accumulator: Box<dyn MetricAccumulator>,
    values: Vec<Value>,
}

impl AggCollector<'_> {
    pub fn name(&self) -> &str {
        &self.prepared.name
    }

    pub fn state(&self) -> CollectorState {
        self.state
    }

    pub fn ignores_query(&self) -> bool {
        self.prepared.ignores_query()
    }

    pub fn bind_segment(&mut self, segment: &dyn Segment) -> Result<()> {
        self.state.bind(segment.segment_ord())?;
        match &mut self.kind {
            CollectorKind::Metric(metric) => {
                metric.bound = Some(metric.source.for_segment(segment)?);
                Ok(())
            }
            CollectorKind::SingleBucket(single) => single.bind_segment(segment),
            CollectorKind::Terms(terms) => terms.bind_segment(segment),
        }
    }

    /// Feed `doc` into the bucket identified by `ordinal`.
    pub fn collect(&mut self, doc: DocId, ordinal: usize) -> Result<()> {
        self.state.focus(doc)?;
        match &mut self.kind {
            CollectorKind::Metric(metric) => {
                let source = metric.bound.as_mut().ok_or_else(|| {
                    Error::InvalidRequest("metric value source not bound".to_string())
                })?;
                source.values_for_doc(doc, &mut metric.values)?;
                metric.accumulator.accumulate(ordinal, &metric.values);
                Ok(())
            }
            CollectorKind::SingleBucket(single) => single.collect(doc, ordinal),
            CollectorKind::Terms(terms) => terms.collect(doc, ordinal),
        }
    }

    /// Finish the pass. Calling it again has no effect.
    pub fn close(&mut self) {
        if !self.state.close() {
            return;
        }
        match &mut self.kind {
            CollectorKind::Metric(metric) => metric.bound = None,
            CollectorKind::SingleBucket(single) => single.close(),
            CollectorKind::Terms(terms) => terms.close(),
        }
    }

    /// Partial result of the bucket identified by `ordinal`.
    pub fn fruit(&self, ordinal: usize) -> AggFruit {
        match &self.kind {
            CollectorKind::Metric(metric) => AggFruit::Metric(metric.accumulator.fruit(ordinal)),
            CollectorKind::SingleBucket(single) => single.fruit(ordinal),
            CollectorKind::Terms(terms) => terms.fruit(ordinal),
        }
    }
}

pub(crate) fn children_fruits(children: &[AggCollector<'_>], ordinal: usize) -> FruitMap {
    children
        .iter()
        .map(|child| (child.name().to_string(), child.fruit(ordinal)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregations::ValueSourceSpec;
    use crate::segment::MemorySegment;
    use serde_json::json;

    fn segment() -> MemorySegment {
        MemorySegment::builder(0)
            .with_documents(&[json!({"value": 1}), json!({"value": 2}), json!({})])
            .unwrap()
            .build()
    }

    #[test]
    fn test_collect_requires_bound_segment() {
        let req = AggregationRequest::value_count("count", ValueSourceSpec::field("value"));
        let prepared =
            PreparedAggregation::prepare(&req, &ScriptEngines::new(), &EngineConfig::default())
                .unwrap();
        let mut collector = prepared.collector(100);
        assert!(collector.collect(0, 0).is_err());

        let seg = segment();
        collector.bind_segment(&seg).unwrap();
        for doc in seg.live_docs() {
            collector.collect(doc, 0).unwrap();
        }
        collector.close();
        collector.close();
        assert_eq!(collector.state(), CollectorState::Closed);
        assert_eq!(collector.fruit(0), AggFruit::Metric(MetricFruit::ValueCount(2)));
        assert!(collector.collect(1, 0).is_err());
    }

    #[test]
    fn test_finalize_missing_fruit_is_empty() {
        let req = AggregationRequest::filter("filter", Query::MatchNone)
            .sub_aggregation(AggregationRequest::value_count("count", ValueSourceSpec::field("value")));
        let prepared =
            PreparedAggregation::prepare(&req, &ScriptEngines::new(), &EngineConfig::default())
                .unwrap();
        let result = prepared.finalize(None);
        assert_eq!(result.doc_count(), Some(0));
        let count = result.aggregations().and_then(|a| a.get("count")).unwrap();
        assert_eq!(count.value(), Some(0.0));
    }
}
