//! Mapping module - the serializable encoding of bucketing rules

pub mod bucket_id;
pub mod bucket_mapping;
pub mod features;
pub mod values;

pub use bucket_id::*;
pub use bucket_mapping::{BucketMapping, BucketRule};
pub use features::{chained_bucket, FeaturesBucketMapping, Remainder};
pub use values::{category_key, FeatureKind, FeatureValues, SpecialGroup, SpecialValue};
