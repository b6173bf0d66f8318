//! Document visibility predicates.
//!
//! A [`Query`] decides which documents of a segment are visible to a search
//! (or to a filter bucket). It is bound once per segment, which resolves the
//! columns it reads, and then evaluated per document.

use crate::segment::{DocId, Segment, ValueColumn};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Query {
    #[default]
    MatchAll,
    MatchNone,
    /// Matches documents where any stored value of `field` equals `value`.
    Term { field: String, value: Value },
    /// Matches documents with at least one value for `field`.
    Exists { field: String },
    Bool {
        #[serde(default)]
        must: Vec<Query>,
        #[serde(default)]
        must_not: Vec<Query>,
    },
}

impl Query {
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Query::Exists {
            field: field.into(),
        }
    }

    pub fn bind(&self, segment: &dyn Segment) -> BoundQuery {
        match self {
            Query::MatchAll => BoundQuery::All,
            Query::MatchNone => BoundQuery::None,
            Query::Term { field, value } => match segment.column(field) {
                Some(column) => BoundQuery::Term {
                    column,
                    value: value.clone(),
                },
                None => BoundQuery::None,
            },
            Query::Exists { field } => match segment.column(field) {
                Some(column) => BoundQuery::Exists { column },
                None => BoundQuery::None,
            },
            Query::Bool { must, must_not } => BoundQuery::Bool {
                must: must.iter().map(|q| q.bind(segment)).collect(),
                must_not: must_not.iter().map(|q| q.bind(segment)).collect(),
            },
        }
    }
}

/// A [`Query`] resolved against one segment.
pub enum BoundQuery {
    All,
    None,
    Term {
        column: Arc<dyn ValueColumn>,
        value: Value,
    },
    Exists {
        column: Arc<dyn ValueColumn>,
    },
    Bool {
        must: Vec<BoundQuery>,
        must_not: Vec<BoundQuery>,
    },
}

impl BoundQuery {
    /// `scratch` is reused between calls to avoid allocating per document.
    pub fn matches(&self, doc: DocId, scratch: &mut Vec<Value>) -> bool {
        match self {
            BoundQuery::All => true,
            BoundQuery::None => false,
            BoundQuery::Term { column, value } => {
                scratch.clear();
                column.values_for_doc(doc, scratch);
                scratch.iter().any(|v| v.term_eq(value))
            }
            BoundQuery::Exists { column } => {
                scratch.clear();
                column.values_for_doc(doc, scratch);
                !scratch.is_empty()
            }
            BoundQuery::Bool { must, must_not } => {
                must.iter().all(|q| q.matches(doc, scratch))
                    && !must_not.iter().any(|q| q.matches(doc, scratch))
            }
        }
    }
}
