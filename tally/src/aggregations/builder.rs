use crate::aggregations::order::{BucketOrder, OrderTarget};
use crate::aggregations::types::{AggregationRequest, AggregationType, TermsSpec};
use crate::aggregations::value_source::ValueSourceSpec;
use crate::query::Query;
use crate::{Error, Result};
use std::collections::HashSet;

impl AggregationRequest {
    pub fn new(name: impl Into<String>, agg_type: AggregationType) -> Self {
        Self {
            name: name.into(),
            agg_type,
            aggs: Vec::new(),
        }
    }

    pub fn value_count(name: impl Into<String>, source: ValueSourceSpec) -> Self {
        Self::new(name, AggregationType::ValueCount(source))
    }

    pub fn sum(name: impl Into<String>, source: ValueSourceSpec) -> Self {
        Self::new(name, AggregationType::Sum(source))
    }

    pub fn avg(name: impl Into<String>, source: ValueSourceSpec) -> Self {
        Self::new(name, AggregationType::Avg(source))
    }

    pub fn min(name: impl Into<String>, source: ValueSourceSpec) -> Self {
        Self::new(name, AggregationType::Min(source))
    }

    pub fn max(name: impl Into<String>, source: ValueSourceSpec) -> Self {
        Self::new(name, AggregationType::Max(source))
    }

    pub fn global(name: impl Into<String>) -> Self {
        Self::new(name, AggregationType::Global {})
    }

    pub fn filter(name: impl Into<String>, query: Query) -> Self {
        Self::new(name, AggregationType::Filter(query))
    }

    pub fn terms(name: impl Into<String>, source: ValueSourceSpec) -> Self {
        Self::new(
            name,
            AggregationType::Terms(TermsSpec {
                source,
                size: None,
                min_doc_count: 1,
                order: Vec::new(),
            }),
        )
    }

    pub fn sub_aggregation(mut self, agg: AggregationRequest) -> Self {
        self.aggs.push(agg);
        self
    }

    /// Append an order to a terms aggregation. Ignored for other kinds.
    pub fn order(mut self, order: BucketOrder) -> Self {
        if let AggregationType::Terms(spec) = &mut self.agg_type {
            spec.order.push(order);
        }
        self
    }

    /// Set the bucket count of a terms aggregation. Ignored for other kinds.
    pub fn size(mut self, size: usize) -> Self {
        if let AggregationType::Terms(spec) = &mut self.agg_type {
            spec.size = Some(size);
        }
        self
    }

    pub fn min_doc_count(mut self, min_doc_count: u64) -> Self {
        if let AggregationType::Terms(spec) = &mut self.agg_type {
            spec.min_doc_count = min_doc_count;
        }
        self
    }

    /// Check the request tree before anything is compiled or collected.
    pub fn validate(&self) -> Result<()> {
        self.validate_at(true)
    }

    fn validate_at(&self, top_level: bool) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Validation("aggregation name must not be empty".to_string()));
        }
        validate_siblings(&self.aggs)?;

        match &self.agg_type {
            t if t.is_metric() && !self.aggs.is_empty() => {
                return Err(Error::Validation(format!(
                    "[{}] is a {} aggregation and cannot have sub-aggregations",
                    self.name,
                    t.kind_name()
                )));
            }
            AggregationType::Global {} if !top_level => {
                return Err(Error::Validation(format!(
                    "[{}] global aggregation must be top-level",
                    self.name
                )));
            }
            AggregationType::Terms(spec) => {
                if spec.size == Some(0) {
                    return Err(Error::Validation(format!(
                        "[{}] terms size must be greater than 0",
                        self.name
                    )));
                }
                for order in &spec.order {
                    if let OrderTarget::Path(path) = &order.target {
                        path.validate(&self.aggs)?;
                    }
                }
            }
            _ => {}
        }

        for child in &self.aggs {
            child.validate_at(false)?;
        }
        Ok(())
    }
}

/// Sibling aggregations must have distinct names.
pub fn validate_siblings(aggs: &[AggregationRequest]) -> Result<()> {
    let mut seen = HashSet::new();
    for agg in aggs {
        if !seen.insert(agg.name.as_str()) {
            return Err(Error::Validation(format!(
                "duplicate aggregation name [{}]",
                agg.name
            )));
        }
    }
    Ok(())
}
