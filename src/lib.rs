//! Scorebin: bucketing engine for credit-scoring features
//!
//! Numerical and categorical features are partitioned into buckets by one of
//! several methods, with special values and missing values routed to
//! dedicated buckets. Fitted mappings serialize to JSON or YAML and can be
//! chained: a pre-bucketing stage followed by a bucketing stage composes
//! into a single mapping over raw values.

pub mod cli;
pub mod error;
pub mod mapping;
pub mod pipeline;
pub mod report;
pub mod utils;

pub use error::BucketError;
pub use mapping::{BucketId, BucketMapping, FeaturesBucketMapping, Remainder};
pub use pipeline::{Bucketer, BucketerOptions, BucketingMethod, BucketingPipeline, BucketingProcess, Transformer};
