use super::MetricFruit;
use crate::aggregations::agg_trait::{ensure_ordinal, MetricAccumulator};
use crate::value::Value;

/// Sums numeric values. Non-numeric values are skipped.
#[derive(Debug, Default)]
pub struct SumAccumulator {
    sums: Vec<f64>,
}

impl MetricAccumulator for SumAccumulator {
    fn accumulate(&mut self, ordinal: usize, values: &[Value]) {
        ensure_ordinal(&mut self.sums, ordinal, 0.0);
        self.sums[ordinal] += values.iter().filter_map(Value::as_f64).sum::<f64>();
    }

    fn fruit(&self, ordinal: usize) -> MetricFruit {
        MetricFruit::Sum(self.sums.get(ordinal).copied().unwrap_or(0.0))
    }
}
