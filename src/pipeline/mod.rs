//! Pipeline module - fitting bucket mappings from data

pub mod bucketer;
pub mod loader;
pub mod methods;
pub mod options;
pub mod process;
pub mod sequence;
pub mod solver;
pub mod stats;
pub mod target;

pub use bucketer::{Bucketer, Transformer};
pub use loader::{load_dataset, save_dataset};
pub use methods::BucketingMethod;
pub use options::{BucketerOptions, MissingTreatment, Specials};
pub use process::{remap_specials, BucketingProcess, ProcessState};
pub use sequence::BucketingPipeline;
pub use solver::{MonotonicityConstraint, SolverConfig};
pub use stats::{BucketRow, BucketTable};
pub use target::{analyze_target_column, target_vector, TargetAnalysis, TargetMapping};
