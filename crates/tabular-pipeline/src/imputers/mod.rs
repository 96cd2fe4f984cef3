//! Missing-value handling.
//!
//! Statistical fills (mean, median, zero) and row removal for numeric
//! columns.

mod statistical;

pub use statistical::StatisticalImputer;
