mod single;
mod terms;

pub use single::SingleBucketCollector;
pub use terms::{PreparedTerms, TermsCollector};
