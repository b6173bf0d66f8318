//! Runs aggregation requests over shards.
//!
//! Scripts are compiled before any document is touched. Each shard is then
//! collected independently (in parallel when configured), the partial
//! results are reduced and finally turned into ordered results.

use crate::aggregations::builder::validate_siblings;
use crate::aggregations::collector::{AggCollector, PreparedAggregation};
use crate::aggregations::reduce::{self, ShardFruit};
use crate::aggregations::types::{AggregationRequest, Aggregations};
use crate::config::EngineConfig;
use crate::query::Query;
use crate::script::ScriptEngines;
use crate::segment::Shard;
use crate::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: Query,
    #[serde(default)]
    pub aggs: Vec<AggregationRequest>,
}

impl SearchRequest {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            aggs: Vec::new(),
        }
    }

    pub fn aggregation(mut self, agg: AggregationRequest) -> Self {
        self.aggs.push(agg);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationResponse {
    pub total_hits: u64,
    /// True when collection was stopped early; counts are then partial.
    pub partial: bool,
    pub aggregations: Aggregations,
}

/// A request whose aggregations have been validated and compiled.
#[derive(Debug)]
pub struct PreparedRequest {
    query: Query,
    aggs: Vec<PreparedAggregation>,
}

impl PreparedRequest {
    pub fn prepare(request: &SearchRequest, scripts: &ScriptEngines, config: &EngineConfig) -> Result<Self> {
        validate_siblings(&request.aggs)?;
        for agg in &request.aggs {
            agg.validate()?;
        }
        let aggs = request
            .aggs
            .iter()
            .map(|agg| PreparedAggregation::prepare(agg, scripts, config))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            query: request.query.clone(),
            aggs,
        })
    }

    /// Collect one shard. Stops between documents once `cancel` fires and
    /// returns the counts gathered so far, flagged as partial.
    pub fn collect_shard(
        &self,
        shard: &Shard,
        max_buckets: usize,
        cancel: &CancellationToken,
    ) -> Result<ShardFruit> {
        let mut collectors: Vec<AggCollector<'_>> =
            self.aggs.iter().map(|agg| agg.collector(max_buckets)).collect();
        let mut total_hits = 0u64;
        let mut collected = 0u64;
        let mut stopped = false;
        let mut scratch = Vec::new();

        'segments: for segment in shard.segments() {
            tracing::debug!(
                shard = shard.name(),
                segment = segment.segment_ord(),
                max_doc = segment.max_doc(),
                "binding segment"
            );
            let query = self.query.bind(segment.as_ref());
            for collector in &mut collectors {
                collector.bind_segment(segment.as_ref())?;
            }

            for doc in segment.live_docs() {
                if cancel.is_cancelled() {
                    stopped = true;
                    break 'segments;
                }
                let visible = query.matches(doc, &mut scratch);
                if visible {
                    total_hits += 1;
                }
                for collector in &mut collectors {
                    if visible || collector.ignores_query() {
                        collector.collect(doc, 0)?;
                    }
                }
                collected += 1;
            }
        }

        for collector in &mut collectors {
            collector.close();
        }

        metrics::counter!("tally_docs_collected_total").increment(collected);
        if stopped {
            metrics::counter!("tally_collection_stopped_total").increment(1);
            tracing::warn!(shard = shard.name(), collected, "collection stopped early");
        }

        Ok(ShardFruit {
            total_hits,
            partial: stopped,
            aggs: collectors
                .iter()
                .map(|c| (c.name().to_string(), c.fruit(0)))
                .collect(),
        })
    }

    pub fn finalize(&self, fruit: &ShardFruit) -> AggregationResponse {
        AggregationResponse {
            total_hits: fruit.total_hits,
            partial: fruit.partial,
            aggregations: Aggregations::new(
                self.aggs
                    .iter()
                    .map(|agg| agg.finalize(fruit.aggs.get(agg.name())))
                    .collect(),
            ),
        }
    }
}

/// Entry point for running aggregations. Script engines are injected here.
#[derive(Debug, Clone, Default)]
pub struct AggregationExecutor {
    scripts: ScriptEngines,
    config: EngineConfig,
}

impl AggregationExecutor {
    pub fn new(scripts: ScriptEngines, config: EngineConfig) -> Self {
        Self { scripts, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn execute(&self, request: &SearchRequest, shards: &[Shard]) -> Result<AggregationResponse> {
        self.execute_with_cancel(request, shards, &CancellationToken::new())
    }

    pub fn execute_with_cancel(
        &self,
        request: &SearchRequest,
        shards: &[Shard],
        cancel: &CancellationToken,
    ) -> Result<AggregationResponse> {
        let start = Instant::now();
        let prepared = PreparedRequest::prepare(request, &self.scripts, &self.config)?;
        let max_buckets = self.config.max_buckets;

        let partials = if self.config.parallel_shards && shards.len() > 1 {
            shards
                .par_iter()
                .map(|shard| prepared.collect_shard(shard, max_buckets, cancel))
                .collect::<Result<Vec<_>>>()?
        } else {
            shards
                .iter()
                .map(|shard| prepared.collect_shard(shard, max_buckets, cancel))
                .collect::<Result<Vec<_>>>()?
        };

        let response = prepared.finalize(&reduce::reduce(partials));
        metrics::counter!("tally_aggregation_requests_total").increment(1);
        tracing::info!(
            shards = shards.len(),
            aggs = request.aggs.len(),
            total_hits = response.total_hits,
            partial = response.partial,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "aggregation request completed"
        );
        Ok(response)
    }
}
