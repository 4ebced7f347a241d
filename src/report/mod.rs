//! Report module - summaries of fitted bucketers

pub mod summary;

pub use summary::*;
