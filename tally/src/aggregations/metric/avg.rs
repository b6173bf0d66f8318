use super::MetricFruit;
use crate::aggregations::agg_trait::{ensure_ordinal, MetricAccumulator};
use crate::value::Value;

#[derive(Debug, Default)]
pub struct AvgAccumulator {
    states: Vec<(f64, u64)>,
}

impl MetricAccumulator for AvgAccumulator {
    fn accumulate(&mut self, ordinal: usize, values: &[Value]) {
        ensure_ordinal(&mut self.states, ordinal, (0.0, 0));
        let state = &mut self.states[ordinal];
        for v in values.iter().filter_map(Value::as_f64) {
            state.0 += v;
            state.1 += 1;
        }
    }

    fn fruit(&self, ordinal: usize) -> MetricFruit {
        let (sum, count) = self.states.get(ordinal).copied().unwrap_or((0.0, 0));
        MetricFruit::Avg { sum, count }
    }
}
