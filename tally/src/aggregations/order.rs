//! Ordering of sibling buckets.
//!
//! Buckets are sorted by a compound list of [`BucketOrder`]s. Each order
//! compares by document count, by key, or by the value found at a path into
//! the buckets' sub-aggregations (`"filter>count"`). Sorting is stable and
//! callers hand in buckets in key order, so buckets that tie on every order
//! come out in ascending key order on every run.

use crate::aggregations::types::{AggregationRequest, AggregationValue, Aggregations, Bucket};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

pub const PATH_SEPARATOR: char = '>';
const VALUE_SUFFIX: &str = ".value";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderTarget {
    Count,
    Key,
    Path(AggPath),
}

/// Path from a bucket into one of its sub-aggregations.
///
/// Every segment but the last names a single-bucket aggregation; the last
/// names a metric (optionally suffixed with `.value`) or a single-bucket
/// aggregation, whose document count is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggPath {
    segments: Vec<String>,
}

impl AggPath {
    pub fn parse(path: &str) -> Result<Self> {
        let mut segments: Vec<String> = path
            .split(PATH_SEPARATOR)
            .map(|s| s.trim().to_string())
            .collect();
        if segments.iter().any(String::is_empty) {
            return Err(Error::Validation(format!("invalid order path [{}]", path)));
        }
        if let Some(last) = segments.last_mut() {
            if let Some(stripped) = last.strip_suffix(VALUE_SUFFIX) {
                *last = stripped.to_string();
            }
            if last.is_empty() || last.contains('.') {
                return Err(Error::Validation(format!(
                    "invalid order path [{}]: only the [value] property can be ordered by",
                    path
                )));
            }
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Resolve the path under `aggs` to a sort key.
    ///
    /// A missing branch, or a metric without a value, resolves to `0.0`.
    pub fn resolve(&self, aggs: &Aggregations) -> f64 {
        let Some((last, parents)) = self.segments.split_last() else {
            return 0.0;
        };
        let mut current = aggs;
        for name in parents {
            match current.get(name).and_then(|r| r.aggregations()) {
                Some(sub) => current = sub,
                None => return 0.0,
            }
        }
        match current.get(last).map(|r| &r.value) {
            Some(AggregationValue::Single(value)) => value.unwrap_or(0.0),
            Some(AggregationValue::SingleBucket(bucket)) => bucket.doc_count as f64,
            _ => 0.0,
        }
    }

    /// Check that the path walks through `aggs` as required.
    pub fn validate(&self, aggs: &[AggregationRequest]) -> Result<()> {
        let invalid = |reason: String| Error::Validation(format!("invalid order path [{}]: {}", self, reason));

        let mut current = aggs;
        let last_index = self.segments.len() - 1;
        for (i, name) in self.segments.iter().enumerate() {
            let req = current
                .iter()
                .find(|r| &r.name == name)
                .ok_or_else(|| invalid(format!("no sub-aggregation named [{}]", name)))?;

            if i == last_index {
                if !req.agg_type.is_metric() && !req.agg_type.is_single_bucket() {
                    return Err(invalid(format!(
                        "[{}] is a multi-bucket aggregation",
                        name
                    )));
                }
            } else if !req.agg_type.is_single_bucket() {
                return Err(invalid(format!(
                    "[{}] must be a single-bucket aggregation",
                    name
                )));
            }
            current = &req.aggs;
        }
        Ok(())
    }
}

impl fmt::Display for AggPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join(">"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, SortDirection>",
    into = "BTreeMap<String, SortDirection>"
)]
pub struct BucketOrder {
    pub target: OrderTarget,
    pub direction: SortDirection,
}

fn direction(ascending: bool) -> SortDirection {
    if ascending {
        SortDirection::Asc
    } else {
        SortDirection::Desc
    }
}

impl BucketOrder {
    pub fn count(ascending: bool) -> Self {
        Self {
            target: OrderTarget::Count,
            direction: direction(ascending),
        }
    }

    pub fn key(ascending: bool) -> Self {
        Self {
            target: OrderTarget::Key,
            direction: direction(ascending),
        }
    }

    /// Order by the value at `path`, e.g. `"filter>count"`.
    pub fn aggregation(path: &str, ascending: bool) -> Result<Self> {
        Ok(Self {
            target: OrderTarget::Path(AggPath::parse(path)?),
            direction: direction(ascending),
        })
    }

    pub fn compare(&self, a: &Bucket, b: &Bucket) -> Ordering {
        let ord = match &self.target {
            OrderTarget::Count => a.doc_count.cmp(&b.doc_count),
            OrderTarget::Key => a.key.cmp(&b.key),
            OrderTarget::Path(path) => path
                .resolve(&a.aggregations)
                .total_cmp(&path.resolve(&b.aggregations)),
        };
        match self.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    }
}

impl TryFrom<BTreeMap<String, SortDirection>> for BucketOrder {
    type Error = String;

    fn try_from(map: BTreeMap<String, SortDirection>) -> std::result::Result<Self, Self::Error> {
        if map.len() != 1 {
            return Err(format!(
                "bucket order must have exactly one entry, got {}",
                map.len()
            ));
        }
        let Some((target, direction)) = map.into_iter().next() else {
            return Err("empty bucket order".to_string());
        };
        let target = match target.as_str() {
            "_count" => OrderTarget::Count,
            "_key" | "_term" => OrderTarget::Key,
            path => OrderTarget::Path(AggPath::parse(path).map_err(|e| e.to_string())?),
        };
        Ok(Self { target, direction })
    }
}

impl From<BucketOrder> for BTreeMap<String, SortDirection> {
    fn from(order: BucketOrder) -> Self {
        let target = match order.target {
            OrderTarget::Count => "_count".to_string(),
            OrderTarget::Key => "_key".to_string(),
            OrderTarget::Path(path) => path.to_string(),
        };
        BTreeMap::from([(target, order.direction)])
    }
}

pub fn compare_buckets(orders: &[BucketOrder], a: &Bucket, b: &Bucket) -> Ordering {
    orders
        .iter()
        .map(|order| order.compare(a, b))
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Stable sort of `buckets` by `orders`. Never mutates bucket contents.
pub fn sort_buckets(buckets: &mut [Bucket], orders: &[BucketOrder]) {
    buckets.sort_by(|a, b| compare_buckets(orders, a, b));
}
