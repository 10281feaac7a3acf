//! Fiscal periods and candidate-list resolution.
//!
//! A [`Period`] is a (year, quarter) pair. The [`PeriodResolver`] turns an
//! item into the ordered list of periods to try, most recent first.

mod resolver;
mod types;

pub use resolver::PeriodResolver;
pub use types::{Period, PeriodError};
