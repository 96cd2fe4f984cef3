//! Pipeline module.
//!
//! The transform engine and the file-level preprocessor built on it.

mod builder;
mod executor;
pub mod outliers;

pub use builder::{PROCESSED_PREFIX, Preprocessor, PreprocessorBuilder};
pub use executor::{TransformEngine, TransformOutput};
pub use outliers::OutlierHandler;
