//! Item identifiers (tickers).

use std::fmt;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static ITEM_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9][A-Z0-9.\-]{0,15}$").expect("valid item pattern"));

/// Errors produced when parsing an item identifier.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ItemError {
    #[error("item identifier is empty")]
    Empty,

    #[error("invalid item identifier: {0}")]
    Invalid(String),
}

/// A normalized item identifier.
///
/// Identifiers are case-insensitive; the normalized form is trimmed and
/// upper-cased, so `"aapl "` and `"AAPL"` are the same item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Item(String);

impl Item {
    /// Parse and normalize an identifier.
    pub fn parse(raw: &str) -> Result<Self, ItemError> {
        let normalized = raw.trim().to_ascii_uppercase();
        if normalized.is_empty() {
            return Err(ItemError::Empty);
        }
        if !ITEM_PATTERN.is_match(&normalized) {
            return Err(ItemError::Invalid(raw.trim().to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Item {
    type Error = ItemError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Item> for String {
    fn from(item: Item) -> Self {
        item.0
    }
}

/// Parse a raw item list, dropping case-insensitive duplicates.
///
/// The first occurrence of each item keeps its position.
pub fn parse_item_list<S: AsRef<str>>(raw: &[S]) -> Result<Vec<Item>, ItemError> {
    let mut items: Vec<Item> = Vec::with_capacity(raw.len());
    for value in raw {
        let item = Item::parse(value.as_ref())?;
        if !items.contains(&item) {
            items.push(item);
        }
    }
    Ok(items)
}
