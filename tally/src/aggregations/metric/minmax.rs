use super::MetricFruit;
use crate::aggregations::agg_trait::{ensure_ordinal, MetricAccumulator};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Min,
    Max,
}

/// Tracks the smallest or largest numeric value per bucket.
#[derive(Debug)]
pub struct MinMaxAccumulator {
    bound: Bound,
    states: Vec<Option<f64>>,
}

impl MinMaxAccumulator {
    pub fn min() -> Self {
        Self {
            bound: Bound::Min,
            states: Vec::new(),
        }
    }

    pub fn max() -> Self {
        Self {
            bound: Bound::Max,
            states: Vec::new(),
        }
    }
}

impl MetricAccumulator for MinMaxAccumulator {
    fn accumulate(&mut self, ordinal: usize, values: &[Value]) {
        ensure_ordinal(&mut self.states, ordinal, None);
        let bound = self.bound;
        let state = &mut self.states[ordinal];
        for v in values.iter().filter_map(Value::as_f64) {
            *state = Some(match (*state, bound) {
                (None, _) => v,
                (Some(cur), Bound::Min) => cur.min(v),
                (Some(cur), Bound::Max) => cur.max(v),
            });
        }
    }

    fn fruit(&self, ordinal: usize) -> MetricFruit {
        let value = self.states.get(ordinal).copied().flatten();
        match self.bound {
            Bound::Min => MetricFruit::Min(value),
            Bound::Max => MetricFruit::Max(value),
        }
    }
}
