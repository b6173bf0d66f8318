use super::MetricFruit;
use crate::aggregations::agg_trait::{ensure_ordinal, MetricAccumulator};
use crate::value::Value;

/// Counts the values a bucket's documents carry.
///
/// A document adds the number of values it has for the source: one for a
/// single-valued field, one per entry for a multi-valued field and zero when
/// the field is missing or unmapped.
#[derive(Debug, Default)]
pub struct ValueCountAccumulator {
    counts: Vec<u64>,
}

impl ValueCountAccumulator {
    pub fn result(&self, ordinal: usize) -> f64 {
        self.count(ordinal) as f64
    }

    fn count(&self, ordinal: usize) -> u64 {
        self.counts.get(ordinal).copied().unwrap_or(0)
    }
}

impl MetricAccumulator for ValueCountAccumulator {
    fn accumulate(&mut self, ordinal: usize, values: &[Value]) {
        ensure_ordinal(&mut self.counts, ordinal, 0);
        self.counts[ordinal] += values.len() as u64;
    }

    fn fruit(&self, ordinal: usize) -> MetricFruit {
        MetricFruit::ValueCount(self.count(ordinal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_count_per_ordinal() {
        let mut acc = ValueCountAccumulator::default();
        acc.accumulate(0, &[Value::I64(1)]);
        acc.accumulate(0, &[Value::I64(2), Value::I64(3)]);
        acc.accumulate(2, &[]);
        acc.accumulate(2, &[Value::Str("x".into())]);

        assert_eq!(acc.result(0), 3.0);
        assert_eq!(acc.result(1), 0.0);
        assert_eq!(acc.result(2), 1.0);
        assert_eq!(acc.result(17), 0.0);
        assert_eq!(acc.fruit(0), MetricFruit::ValueCount(3));
    }
}
