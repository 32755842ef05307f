//! Record and aggregate types
//!
//! A [`Record`] is one decoded value from a snapshot. The aggregate types
//! are what the counter accumulates and what the exporter reads back.

use serde::{Deserialize, Serialize};

/// One decoded key/value from a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Key name as stored
    pub key: String,

    /// Value type (string, list, hash, set, sortedset, ...)
    #[serde(rename = "type")]
    pub value_type: String,

    /// Estimated memory used by the key and its value
    pub bytes: u64,

    /// Number of elements in the value (1 for strings)
    #[serde(default)]
    pub num_of_elem: u64,

    /// Length of the largest element
    #[serde(default)]
    pub len_of_largest_elem: u64,

    /// Field or member holding the largest element
    #[serde(default)]
    pub field_of_largest_elem: String,
}

impl Record {
    /// Build a record with only the fields the counter needs
    pub fn new(key: impl Into<String>, value_type: impl Into<String>, bytes: u64, num_of_elem: u64) -> Self {
        Self {
            key: key.into(),
            value_type: value_type.into(),
            bytes,
            num_of_elem,
            len_of_largest_elem: 0,
            field_of_largest_elem: String::new(),
        }
    }
}

/// Compound dimension key: a value type paired with a prefix or tier label
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TypeKeyPair {
    /// Value type
    #[serde(rename = "type")]
    pub value_type: String,

    /// Prefix string or tier label
    pub key: String,
}

impl TypeKeyPair {
    pub fn new(value_type: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            value_type: value_type.into(),
            key: key.into(),
        }
    }
}

/// Running byte and count totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub bytes: u64,
    pub num: u64,
}

impl Totals {
    /// Credit one record of `bytes` size
    pub fn add(&mut self, bytes: u64) {
        self.bytes = self.bytes.saturating_add(bytes);
        self.num = self.num.saturating_add(1);
    }
}

/// Bytes and count accumulated under a [`TypeKeyPair`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub pair: TypeKeyPair,
    pub bytes: u64,
    pub num: u64,
}

impl Aggregate {
    pub fn from_totals(pair: TypeKeyPair, totals: Totals) -> Self {
        Self {
            pair,
            bytes: totals.bytes,
            num: totals.num,
        }
    }
}

/// Totals grouped by (type, key prefix)
pub type PrefixAggregate = Aggregate;

/// Totals grouped by (type, length tier)
pub type LengthTierAggregate = Aggregate;

/// Global totals for one value type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeTotal {
    pub value_type: String,
    pub bytes: u64,
    pub num: u64,
}

/// Per-type totals plus grand totals across all types
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeReport {
    pub types: Vec<TypeTotal>,
    pub total_bytes: u64,
    pub total_num: u64,
}

/// A record together with its 1-based position in the size ranking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntry {
    pub rank: usize,
    pub record: Record,
}
