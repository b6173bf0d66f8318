use crate::aggregations::metric::MetricFruit;
use crate::segment::DocId;
use crate::value::Value;
use crate::{Error, Result};

/// Per-bucket metric state, indexed by bucket ordinal.
///
/// Ordinals never seen by `accumulate` report the metric's identity.
pub trait MetricAccumulator: Send {
    fn accumulate(&mut self, ordinal: usize, values: &[Value]);

    fn fruit(&self, ordinal: usize) -> MetricFruit;
}

/// Grow `states` so that `ordinal` is addressable.
pub(crate) fn ensure_ordinal<T: Clone>(states: &mut Vec<T>, ordinal: usize, init: T) {
    if ordinal >= states.len() {
        states.resize(ordinal + 1, init);
    }
}

/// Lifecycle of a collector during one shard pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Unopened,
    SegmentBound(u32),
    DocumentFocused { segment: u32, doc: DocId },
    Closed,
}

impl CollectorState {
    pub fn bind(&mut self, segment: u32) -> Result<()> {
        match self {
            CollectorState::Closed => Err(Error::InvalidRequest(
                "cannot bind a closed collector to a segment".to_string(),
            )),
            _ => {
                *self = CollectorState::SegmentBound(segment);
                Ok(())
            }
        }
    }

    pub fn focus(&mut self, doc: DocId) -> Result<()> {
        match *self {
            CollectorState::SegmentBound(segment)
            | CollectorState::DocumentFocused { segment, .. } => {
                *self = CollectorState::DocumentFocused { segment, doc };
                Ok(())
            }
            CollectorState::Unopened => Err(Error::InvalidRequest(
                "collector received a document before a segment was bound".to_string(),
            )),
            CollectorState::Closed => Err(Error::InvalidRequest(
                "collector received a document after it was closed".to_string(),
            )),
        }
    }

    /// Returns `true` only for the transition into `Closed`.
    pub fn close(&mut self) -> bool {
        let first = *self != CollectorState::Closed;
        *self = CollectorState::Closed;
        first
    }
}
