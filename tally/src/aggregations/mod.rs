mod agg_trait;
mod bucket;
mod builder;
mod collector;
mod executor;
mod metric;
pub mod order;
mod property;
pub mod reduce;
pub mod types;
mod value_source;

pub use agg_trait::{CollectorState, MetricAccumulator};
pub use bucket::{PreparedTerms, SingleBucketCollector, TermsCollector};
pub use collector::{AggCollector, PreparedAggregation};
pub use executor::{AggregationExecutor, AggregationResponse, PreparedRequest, SearchRequest};
pub use metric::{
    AvgAccumulator, MetricFruit, MetricKind, MinMaxAccumulator, SumAccumulator,
    ValueCountAccumulator,
};
pub use order::{AggPath, BucketOrder, OrderTarget, SortDirection};
pub use property::PropertyValue;
pub use reduce::{AggFruit, ShardFruit};
pub use types::{
    AggregationRequest, AggregationResult, AggregationType, AggregationValue, Aggregations,
    Bucket, SingleBucket, TermsSpec,
};
pub use value_source::{ResolvedSource, ValueSource, ValueSourceSpec};
