//! The aggregation engine
//!
//! [`Counter`] consumes a record stream once and keeps four views of it:
//! the largest individual records, per-type totals, per-(type, tier) totals
//! and per-(type, prefix) totals. Prefix totals are accumulated in a plain
//! map for the whole stream and only ranked at the end, since evicting a
//! prefix mid-stream would lose part of its sum.

use crate::counter::prefix::{derive_prefixes, DEFAULT_SEPARATORS};
use crate::counter::tier::LengthTiers;
use crate::counter::topk::{BySize, PrefixRank, TopK, LARGEST_PREFIXES_CAPACITY, LARGEST_RECORDS_CAPACITY};
use crate::record::{
    Aggregate, LengthTierAggregate, PrefixAggregate, RankedEntry, Record, Totals, TypeKeyPair,
    TypeReport, TypeTotal,
};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Engine settings
#[derive(Debug, Clone)]
pub struct CounterConfig {
    /// Characters that delimit key segments
    pub separators: String,

    /// Element-count tiers
    pub tiers: LengthTiers,

    /// Capacity of the largest-records ranking
    pub records_capacity: usize,

    /// Capacity of the largest-prefixes ranking
    pub prefixes_capacity: usize,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            separators: DEFAULT_SEPARATORS.to_string(),
            tiers: LengthTiers::default(),
            records_capacity: LARGEST_RECORDS_CAPACITY,
            prefixes_capacity: LARGEST_PREFIXES_CAPACITY,
        }
    }
}

/// Single-use memory usage counter
///
/// Not thread-safe by design of its API: every mutation takes `&mut self`.
/// Build one per analysis job.
#[derive(Debug)]
pub struct Counter {
    config: CounterConfig,
    largest_records: TopK<BySize>,
    largest_prefixes: TopK<PrefixRank>,
    prefix_totals: HashMap<TypeKeyPair, Totals>,
    tier_totals: HashMap<TypeKeyPair, Totals>,
    type_totals: HashMap<String, Totals>,
    records_seen: u64,
    finalized: bool,
}

impl Counter {
    pub fn new(config: CounterConfig) -> Self {
        Self {
            largest_records: TopK::new(config.records_capacity),
            largest_prefixes: TopK::new(config.prefixes_capacity),
            prefix_totals: HashMap::new(),
            tier_totals: HashMap::new(),
            type_totals: HashMap::new(),
            records_seen: 0,
            finalized: false,
            config,
        }
    }

    /// Count every record until the stream ends, then rank prefixes
    ///
    /// Blocks for as long as the producer keeps the stream open. A counter
    /// that already finalized ignores further streams.
    pub fn consume<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = Record>,
    {
        if self.finalized {
            warn!("counter already finalized, ignoring additional stream");
            return;
        }

        for record in records {
            self.count(record);
        }

        self.finalize();
    }

    fn count(&mut self, record: Record) {
        self.records_seen += 1;
        self.count_by_type(&record);
        self.count_by_length(&record);
        self.count_by_prefix(&record);
        self.largest_records.insert(BySize(record));
    }

    fn count_by_type(&mut self, record: &Record) {
        if let Some(totals) = self.type_totals.get_mut(&record.value_type) {
            totals.add(record.bytes);
            return;
        }
        let mut totals = Totals::default();
        totals.add(record.bytes);
        self.type_totals.insert(record.value_type.clone(), totals);
    }

    fn count_by_length(&mut self, record: &Record) {
        if let Some(label) = self.config.tiers.label(record.num_of_elem) {
            let pair = TypeKeyPair::new(record.value_type.as_str(), label);
            self.tier_totals.entry(pair).or_default().add(record.bytes);
        }
    }

    fn count_by_prefix(&mut self, record: &Record) {
        for prefix in derive_prefixes(&record.key, &self.config.separators) {
            let pair = TypeKeyPair::new(record.value_type.as_str(), prefix);
            self.prefix_totals.entry(pair).or_default().add(record.bytes);
        }
    }

    /// Move every prefix total into the bounded ranking, emptying the map
    fn finalize(&mut self) {
        let distinct = self.prefix_totals.len();
        for (pair, totals) in self.prefix_totals.drain() {
            self.largest_prefixes
                .insert(PrefixRank(Aggregate::from_totals(pair, totals)));
        }
        self.prefix_totals.shrink_to_fit();
        self.finalized = true;

        debug!(
            records = self.records_seen,
            distinct_prefixes = distinct,
            ranked_prefixes = self.largest_prefixes.len(),
            "counter finalized"
        );
    }

    /// Up to `n` largest records, largest first
    pub fn largest_records(&self, n: usize) -> Vec<RankedEntry> {
        let n = n.min(self.largest_records.capacity());
        self.largest_records
            .snapshot()
            .into_iter()
            .take(n)
            .enumerate()
            .map(|(i, BySize(record))| RankedEntry { rank: i + 1, record })
            .collect()
    }

    /// Every retained prefix aggregate, highest ranked first
    pub fn largest_prefixes(&self) -> Vec<PrefixAggregate> {
        self.largest_prefixes
            .snapshot()
            .into_iter()
            .map(|PrefixRank(aggregate)| aggregate)
            .collect()
    }

    /// Per-(type, tier) totals in no particular order
    pub fn length_tier_report(&self) -> Vec<LengthTierAggregate> {
        self.tier_totals
            .iter()
            .map(|(pair, totals)| Aggregate::from_totals(pair.clone(), *totals))
            .collect()
    }

    /// Per-type totals in no particular order, plus grand totals
    pub fn type_report(&self) -> TypeReport {
        let mut report = TypeReport::default();
        for (value_type, totals) in &self.type_totals {
            report.total_bytes = report.total_bytes.saturating_add(totals.bytes);
            report.total_num = report.total_num.saturating_add(totals.num);
            report.types.push(TypeTotal {
                value_type: value_type.clone(),
                bytes: totals.bytes,
                num: totals.num,
            });
        }
        report
    }

    /// Records counted so far
    pub fn records_seen(&self) -> u64 {
        self.records_seen
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn config(&self) -> &CounterConfig {
        &self.config
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new(CounterConfig::default())
    }
}
