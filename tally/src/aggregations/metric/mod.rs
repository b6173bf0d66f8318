mod avg;
mod minmax;
mod sum;
mod value_count;

pub use avg::AvgAccumulator;
pub use minmax::MinMaxAccumulator;
pub use sum::SumAccumulator;
pub use value_count::ValueCountAccumulator;

use crate::aggregations::agg_trait::MetricAccumulator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    ValueCount,
    Sum,
    Avg,
    Min,
    Max,
}

impl MetricKind {
    pub fn accumulator(self) -> Box<dyn MetricAccumulator> {
        match self {
            MetricKind::ValueCount => Box::<ValueCountAccumulator>::default(),
            MetricKind::Sum => Box::<SumAccumulator>::default(),
            MetricKind::Avg => Box::<AvgAccumulator>::default(),
            MetricKind::Min => Box::new(MinMaxAccumulator::min()),
            MetricKind::Max => Box::new(MinMaxAccumulator::max()),
        }
    }
}

/// Partial metric result of one bucket, mergeable across segments and shards.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricFruit {
    ValueCount(u64),
    Sum(f64),
    Avg { sum: f64, count: u64 },
    Min(Option<f64>),
    Max(Option<f64>),
}

impl MetricFruit {
    pub fn empty(kind: MetricKind) -> Self {
        match kind {
            MetricKind::ValueCount => MetricFruit::ValueCount(0),
            MetricKind::Sum => MetricFruit::Sum(0.0),
            MetricKind::Avg => MetricFruit::Avg { sum: 0.0, count: 0 },
            MetricKind::Min => MetricFruit::Min(None),
            MetricKind::Max => MetricFruit::Max(None),
        }
    }

    pub fn merge(&mut self, other: MetricFruit) {
        match (self, other) {
            (MetricFruit::ValueCount(a), MetricFruit::ValueCount(b)) => *a += b,
            (MetricFruit::Sum(a), MetricFruit::Sum(b)) => *a += b,
            (
                MetricFruit::Avg { sum, count },
                MetricFruit::Avg {
                    sum: other_sum,
                    count: other_count,
                },
            ) => {
                *sum += other_sum;
                *count += other_count;
            }
            (MetricFruit::Min(a), MetricFruit::Min(b)) => *a = pick(*a, b, f64::min),
            (MetricFruit::Max(a), MetricFruit::Max(b)) => *a = pick(*a, b, f64::max),
            (this, other) => {
                tracing::warn!(?this, ?other, "ignoring merge of mismatched metric fruits");
            }
        }
    }

    /// Final metric value. `None` when avg/min/max saw no values.
    pub fn value(&self) -> Option<f64> {
        match self {
            MetricFruit::ValueCount(count) => Some(*count as f64),
            MetricFruit::Sum(sum) => Some(*sum),
            MetricFruit::Avg { count: 0, .. } => None,
            MetricFruit::Avg { sum, count } => Some(sum / *count as f64),
            MetricFruit::Min(v) | MetricFruit::Max(v) => *v,
        }
    }
}

fn pick(a: Option<f64>, b: Option<f64>, f: fn(f64, f64) -> f64) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(f(a, b)),
        (a, None) => a,
        (None, b) => b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_value_count() {
        let mut fruit = MetricFruit::ValueCount(10);
        fruit.merge(MetricFruit::ValueCount(0));
        fruit.merge(MetricFruit::ValueCount(5));
        assert_eq!(fruit.value(), Some(15.0));
    }

    #[test]
    fn test_merge_avg_and_bounds() {
        let mut avg = MetricFruit::empty(MetricKind::Avg);
        assert_eq!(avg.value(), None);
        avg.merge(MetricFruit::Avg { sum: 6.0, count: 2 });
        avg.merge(MetricFruit::Avg { sum: 3.0, count: 1 });
        assert_eq!(avg.value(), Some(3.0));

        let mut min = MetricFruit::Min(None);
        min.merge(MetricFruit::Min(Some(4.0)));
        min.merge(MetricFruit::Min(Some(2.0)));
        min.merge(MetricFruit::Min(None));
        assert_eq!(min.value(), Some(2.0));
    }
}
