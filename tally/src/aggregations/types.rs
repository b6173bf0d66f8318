use crate::aggregations::order::BucketOrder;
use crate::aggregations::value_source::ValueSourceSpec;
use crate::query::Query;
use crate::value::BucketKey;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationRequest {
    pub name: String,
    #[serde(flatten)]
    pub agg_type: AggregationType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggs: Vec<AggregationRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationType {
    ValueCount(ValueSourceSpec),
    Sum(ValueSourceSpec),
    Avg(ValueSourceSpec),
    Min(ValueSourceSpec),
    Max(ValueSourceSpec),
    Global {},
    Filter(Query),
    Terms(TermsSpec),
}

impl AggregationType {
    pub fn is_metric(&self) -> bool {
        matches!(
            self,
            AggregationType::ValueCount(_)
                | AggregationType::Sum(_)
                | AggregationType::Avg(_)
                | AggregationType::Min(_)
                | AggregationType::Max(_)
        )
    }

    /// Global and filter aggregations produce exactly one bucket.
    pub fn is_single_bucket(&self) -> bool {
        matches!(self, AggregationType::Global {} | AggregationType::Filter(_))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            AggregationType::ValueCount(_) => "value_count",
            AggregationType::Sum(_) => "sum",
            AggregationType::Avg(_) => "avg",
            AggregationType::Min(_) => "min",
            AggregationType::Max(_) => "max",
            AggregationType::Global {} => "global",
            AggregationType::Filter(_) => "filter",
            AggregationType::Terms(_) => "terms",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermsSpec {
    #[serde(flatten)]
    pub source: ValueSourceSpec,
    /// Maximum number of buckets returned. Defaults to the engine config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(default = "default_min_doc_count")]
    pub min_doc_count: u64,
    /// Compound order; empty means `_count` descending.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order: Vec<BucketOrder>,
}

fn default_min_doc_count() -> u64 {
    1
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationResult {
    pub name: String,
    pub value: AggregationValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregationValue {
    /// Metric value. `None` for avg/min/max over no values.
    Single(Option<f64>),
    SingleBucket(SingleBucket),
    Buckets(Vec<Bucket>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SingleBucket {
    pub doc_count: u64,
    pub aggregations: Aggregations,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub key: BucketKey,
    pub doc_count: u64,
    pub aggregations: Aggregations,
}

/// Sibling aggregation results, in request order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Aggregations(Vec<AggregationResult>);

impl Aggregations {
    pub fn new(results: Vec<AggregationResult>) -> Self {
        Self(results)
    }

    pub fn get(&self, name: &str) -> Option<&AggregationResult> {
        self.0.iter().find(|r| r.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AggregationResult> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|r| r.name.as_str()).collect()
    }
}

impl AggregationResult {
    pub fn metric(name: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            name: name.into(),
            value: AggregationValue::Single(value),
        }
    }

    /// Metric value, if this is a metric aggregation with a value.
    pub fn value(&self) -> Option<f64> {
        match &self.value {
            AggregationValue::Single(v) => *v,
            _ => None,
        }
    }

    /// Document count of a single-bucket aggregation.
    pub fn doc_count(&self) -> Option<u64> {
        match &self.value {
            AggregationValue::SingleBucket(b) => Some(b.doc_count),
            _ => None,
        }
    }

    /// Sub-aggregations of a single-bucket aggregation.
    pub fn aggregations(&self) -> Option<&Aggregations> {
        match &self.value {
            AggregationValue::SingleBucket(b) => Some(&b.aggregations),
            _ => None,
        }
    }

    pub fn buckets(&self) -> Option<&[Bucket]> {
        match &self.value {
            AggregationValue::Buckets(b) => Some(b),
            _ => None,
        }
    }
}

impl Serialize for Aggregations {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for result in &self.0 {
            map.serialize_entry(&result.name, &result.value)?;
        }
        map.end()
    }
}

impl Serialize for AggregationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.name, &self.value)?;
        map.end()
    }
}

impl Serialize for AggregationValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AggregationValue::Single(value) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("value", value)?;
                map.end()
            }
            AggregationValue::SingleBucket(bucket) => {
                let mut map = serializer.serialize_map(Some(1 + bucket.aggregations.len()))?;
                map.serialize_entry("doc_count", &bucket.doc_count)?;
                for sub in bucket.aggregations.iter() {
                    map.serialize_entry(&sub.name, &sub.value)?;
                }
                map.end()
            }
            AggregationValue::Buckets(buckets) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("buckets", buckets)?;
                map.end()
            }
        }
    }
}

impl Serialize for Bucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2 + self.aggregations.len()))?;
        map.serialize_entry("key", &self.key)?;
        map.serialize_entry("doc_count", &self.doc_count)?;
        for sub in self.aggregations.iter() {
            map.serialize_entry(&sub.name, &sub.value)?;
        }
        map.end()
    }
}
