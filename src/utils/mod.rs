//! Terminal helpers for the command-line front end

pub mod progress;
pub mod styling;

pub use progress::*;
pub use styling::*;
