//! Aggregation and ranking
//!
//! - [`prefix`]: key-prefix derivation with digit normalization
//! - [`topk`]: bounded min-heap rankings
//! - [`tier`]: element-count tier classification
//! - [`engine`]: the [`Counter`] that ties them together over a record stream

pub mod engine;
pub mod prefix;
pub mod tier;
pub mod topk;

pub use engine::{Counter, CounterConfig};
pub use prefix::{derive_prefixes, DEFAULT_SEPARATORS};
pub use tier::{LengthTiers, DEFAULT_TIERS};
pub use topk::{TopK, LARGEST_PREFIXES_CAPACITY, LARGEST_RECORDS_CAPACITY};
