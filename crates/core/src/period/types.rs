//! Period type.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Errors produced when constructing a period.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("quarter must be in 1..=4, got {0}")]
    InvalidQuarter(u8),
}

/// A fiscal quarter.
///
/// Ordering is chronological: by year, then quarter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Period {
    year: i32,
    quarter: u8,
}

impl Period {
    pub fn new(year: i32, quarter: u8) -> Result<Self, PeriodError> {
        if !(1..=4).contains(&quarter) {
            return Err(PeriodError::InvalidQuarter(quarter));
        }
        Ok(Self { year, quarter })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn quarter(&self) -> u8 {
        self.quarter
    }

    /// The quarter that contains `date`.
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            quarter: (date.month0() / 3) as u8 + 1,
        }
    }

    /// The most recent quarter that has fully ended on or before `date`.
    pub fn last_closed(date: NaiveDate) -> Self {
        Self::containing(date).previous()
    }

    /// The quarter immediately before this one, rolling over the year.
    pub fn previous(&self) -> Self {
        if self.quarter == 1 {
            Self {
                year: self.year - 1,
                quarter: 4,
            }
        } else {
            Self {
                year: self.year,
                quarter: self.quarter - 1,
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Q{}", self.year, self.quarter)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            year: i32,
            quarter: u8,
        }

        let raw = Raw::deserialize(deserializer)?;
        Period::new(raw.year, raw.quarter).map_err(serde::de::Error::custom)
    }
}
