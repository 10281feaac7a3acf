//! Candidate-list resolution.

use chrono::{NaiveDate, Utc};

use super::Period;
use crate::item::Item;

/// Resolves an item to the ordered list of periods to try.
///
/// The list starts at the most recently closed quarter and steps backward
/// one quarter at a time, `horizon` entries long. It depends only on the
/// reference date and the horizon.
#[derive(Debug, Clone)]
pub struct PeriodResolver {
    horizon: usize,
    reference_date: Option<NaiveDate>,
}

impl PeriodResolver {
    /// Resolver anchored on today's date (UTC).
    pub fn new(horizon: usize) -> Self {
        Self {
            horizon,
            reference_date: None,
        }
    }

    /// Resolver anchored on a fixed date.
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    /// Candidate periods for `item`, strictly decreasing.
    pub fn resolve(&self, _item: &Item) -> Vec<Period> {
        let today = self
            .reference_date
            .unwrap_or_else(|| Utc::now().date_naive());
        Self::candidates_from(Period::last_closed(today), self.horizon)
    }

    /// `horizon` periods stepping backward from `start` (inclusive).
    pub fn candidates_from(start: Period, horizon: usize) -> Vec<Period> {
        std::iter::successors(Some(start), |p| Some(p.previous()))
            .take(horizon)
            .collect()
    }
}
