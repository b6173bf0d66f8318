//! Dotted property access into results, e.g. `global.count.value`.

use crate::aggregations::types::{AggregationResult, AggregationValue, Aggregations, Bucket};
use crate::value::BucketKey;

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue<'a> {
    Number(f64),
    Null,
    Key(&'a BucketKey),
    Aggregation(&'a AggregationResult),
    List(Vec<PropertyValue<'a>>),
}

impl PropertyValue<'_> {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(v) => Some(*v),
            _ => None,
        }
    }
}

fn split(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

impl Aggregations {
    /// Resolve `name[.property...]` against these results.
    pub fn property(&self, path: &str) -> Option<PropertyValue<'_>> {
        let parts = split(path);
        let (first, rest) = parts.split_first()?;
        self.get(first)?.property_at(rest)
    }
}

impl AggregationResult {
    /// Resolve a property of this result. An empty path is the result
    /// itself; metrics expose `value`, single-bucket aggregations expose
    /// `doc_count` (or `_count`) and their sub-aggregations, and multi-bucket
    /// aggregations resolve the path in every bucket.
    pub fn property(&self, path: &str) -> Option<PropertyValue<'_>> {
        self.property_at(&split(path))
    }

    fn property_at(&self, path: &[&str]) -> Option<PropertyValue<'_>> {
        let Some((first, rest)) = path.split_first() else {
            return Some(PropertyValue::Aggregation(self));
        };
        match &self.value {
            AggregationValue::Single(value) => match (*first, rest.is_empty()) {
                ("value", true) => Some(value.map_or(PropertyValue::Null, PropertyValue::Number)),
                _ => None,
            },
            AggregationValue::SingleBucket(bucket) => {
                single_bucket_property(bucket.doc_count, &bucket.aggregations, first, rest)
            }
            AggregationValue::Buckets(buckets) => buckets
                .iter()
                .map(|b| b.property_at(path))
                .collect::<Option<Vec<_>>>()
                .map(PropertyValue::List),
        }
    }
}

impl Bucket {
    pub fn property(&self, path: &str) -> Option<PropertyValue<'_>> {
        self.property_at(&split(path))
    }

    fn property_at(&self, path: &[&str]) -> Option<PropertyValue<'_>> {
        let (first, rest) = path.split_first()?;
        if *first == "_key" && rest.is_empty() {
            return Some(PropertyValue::Key(&self.key));
        }
        single_bucket_property(self.doc_count, &self.aggregations, first, rest)
    }
}

fn single_bucket_property<'a>(
    doc_count: u64,
    aggs: &'a Aggregations,
    first: &str,
    rest: &[&str],
) -> Option<PropertyValue<'a>> {
    match first {
        "doc_count" | "_count" if rest.is_empty() => Some(PropertyValue::Number(doc_count as f64)),
        name => aggs.get(name)?.property_at(rest),
    }
}
