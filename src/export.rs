//! Statistics export
//!
//! Turns a finalized [`Counter`] into the persisted datasets, namespaced by
//! an instance identifier such as `namespace:port`:
//!
//! | Key                                  | Kind   |
//! |--------------------------------------|--------|
//! | `I:LargestEntries`                   | list   |
//! | `I:LargestkeyPrefixesByType:<type>`  | hash   |
//! | `I:LargestkeyPrefixesAllTypes`       | set    |
//! | `I:TypeAndBytes`                     | string |
//! | `I:TotalBytesAndNum`                 | string |
//! | `I:LenLevelCount`                    | string |
//!
//! Planning is pure; [`StatsExporter::export`] then applies the plan to a
//! sink in order and stops at the first failed write.

use crate::counter::Counter;
use crate::error::{SinkError, SinkResult};
use crate::sink::{SinkWrite, StatsSink};
use humansize::{format_size, DECIMAL};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Records written to `LargestEntries`
pub const DEFAULT_LARGEST_ENTRIES: usize = 100;

/// Prefixes at or above this size are always written
pub const DEFAULT_PREFIX_MIN_BYTES: u64 = 1_000_000;

/// Smaller prefixes are written until a type has this many entries
pub const DEFAULT_PREFIX_PER_TYPE: usize = 50;

/// Limits applied when writing rankings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportPolicy {
    pub largest_entries: usize,
    pub prefix_min_bytes: u64,
    pub prefix_per_type: usize,
}

impl Default for ExportPolicy {
    fn default() -> Self {
        Self {
            largest_entries: DEFAULT_LARGEST_ENTRIES,
            prefix_min_bytes: DEFAULT_PREFIX_MIN_BYTES,
            prefix_per_type: DEFAULT_PREFIX_PER_TYPE,
        }
    }
}

/// What an export wrote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub writes: usize,
    pub largest_entries: usize,
    pub prefix_entries: usize,
    pub prefix_types: usize,
}

#[derive(Serialize)]
struct LargestEntryJson<'a> {
    key: &'a str,
    #[serde(rename = "type")]
    value_type: &'a str,
    bytes: u64,
    human_size: String,
    num_of_elem: u64,
    len_of_largest_elem: u64,
    field_of_largest_elem: &'a str,
}

#[derive(Serialize)]
struct PrefixJson<'a> {
    key: &'a str,
    bytes: u64,
    human_size: String,
    #[serde(rename = "numOfKey")]
    num_of_key: u64,
}

#[derive(Serialize)]
struct SizeJson {
    num: u64,
    bytes: u64,
    human_size: String,
}

impl SizeJson {
    fn new(num: u64, bytes: u64) -> Self {
        Self {
            num,
            bytes,
            human_size: human_size(bytes),
        }
    }
}

#[derive(Serialize)]
struct TotalJson {
    #[serde(rename = "totleNum")]
    totle_num: u64,
    #[serde(rename = "totleBytes")]
    totle_bytes: u64,
}

/// Human-readable decimal size, e.g. "1.20 MB"
pub fn human_size(bytes: u64) -> String {
    format_size(bytes, DECIMAL)
}

/// Full key of a dataset for an instance
pub fn dataset_key(instance: &str, dataset: &str) -> String {
    format!("{}:{}", instance, dataset)
}

fn to_json<T: Serialize>(dataset: &str, value: &T) -> SinkResult<String> {
    serde_json::to_string(value).map_err(|e| SinkError::Serialization {
        dataset: dataset.to_string(),
        reason: e.to_string(),
    })
}

/// Serializes counter state into sink writes
#[derive(Debug, Clone, Default)]
pub struct StatsExporter {
    policy: ExportPolicy,
}

impl StatsExporter {
    pub fn new(policy: ExportPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ExportPolicy {
        &self.policy
    }

    /// Build every write for `instance` without touching a sink
    pub fn plan(&self, counter: &Counter, instance: &str) -> SinkResult<Vec<SinkWrite>> {
        let mut writes = vec![self.largest_entries(counter, instance)?];
        writes.extend(self.prefixes_by_type(counter, instance)?);
        writes.push(self.type_and_bytes(counter, instance)?);
        writes.push(self.total_bytes_and_num(counter, instance)?);
        writes.push(self.len_level_count(counter, instance)?);
        Ok(writes)
    }

    /// Plan and apply every write to `sink`
    pub async fn export<S>(&self, counter: &Counter, instance: &str, sink: &S) -> SinkResult<ExportSummary>
    where
        S: StatsSink + ?Sized,
    {
        let writes = self.plan(counter, instance)?;
        let mut summary = ExportSummary::default();

        for write in &writes {
            debug!(key = write.key(), "writing dataset");
            sink.apply(write).await?;
            summary.writes += 1;

            match write {
                SinkWrite::ReplaceList { values, .. } => summary.largest_entries = values.len(),
                SinkWrite::ReplaceHash { fields, .. } => summary.prefix_entries += fields.len(),
                SinkWrite::ReplaceSet { members, .. } => summary.prefix_types = members.len(),
                SinkWrite::Set { .. } => {}
            }
        }

        info!(
            instance,
            writes = summary.writes,
            largest_entries = summary.largest_entries,
            prefix_entries = summary.prefix_entries,
            "statistics exported"
        );
        Ok(summary)
    }

    fn largest_entries(&self, counter: &Counter, instance: &str) -> SinkResult<SinkWrite> {
        let values = counter
            .largest_records(self.policy.largest_entries)
            .iter()
            .map(|entry| {
                let record = &entry.record;
                to_json(
                    "LargestEntries",
                    &LargestEntryJson {
                        key: &record.key,
                        value_type: &record.value_type,
                        bytes: record.bytes,
                        human_size: human_size(record.bytes),
                        num_of_elem: record.num_of_elem,
                        len_of_largest_elem: record.len_of_largest_elem,
                        field_of_largest_elem: &record.field_of_largest_elem,
                    },
                )
            })
            .collect::<SinkResult<Vec<_>>>()?;

        Ok(SinkWrite::ReplaceList {
            key: dataset_key(instance, "LargestEntries"),
            values,
        })
    }

    /// One hash per type plus the set of types that got one
    fn prefixes_by_type(&self, counter: &Counter, instance: &str) -> SinkResult<Vec<SinkWrite>> {
        let mut by_type: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();

        for prefix in counter.largest_prefixes() {
            let fields = by_type.entry(prefix.pair.value_type.clone()).or_default();
            // small prefix and the type's list is already long enough
            if prefix.bytes < self.policy.prefix_min_bytes && fields.len() >= self.policy.prefix_per_type {
                continue;
            }
            let value = to_json(
                "LargestkeyPrefixesByType",
                &PrefixJson {
                    key: &prefix.pair.key,
                    bytes: prefix.bytes,
                    human_size: human_size(prefix.bytes),
                    num_of_key: prefix.num,
                },
            )?;
            fields.push((prefix.pair.key.clone(), value));
        }

        let mut writes = Vec::with_capacity(by_type.len() + 1);
        let mut types = Vec::with_capacity(by_type.len());
        for (value_type, fields) in by_type {
            if fields.is_empty() {
                continue;
            }
            writes.push(SinkWrite::ReplaceHash {
                key: dataset_key(instance, &format!("LargestkeyPrefixesByType:{}", value_type)),
                fields,
            });
            types.push(value_type);
        }
        writes.push(SinkWrite::ReplaceSet {
            key: dataset_key(instance, "LargestkeyPrefixesAllTypes"),
            members: types,
        });

        Ok(writes)
    }

    fn type_and_bytes(&self, counter: &Counter, instance: &str) -> SinkResult<SinkWrite> {
        let data: BTreeMap<String, SizeJson> = counter
            .type_report()
            .types
            .into_iter()
            .map(|t| (t.value_type, SizeJson::new(t.num, t.bytes)))
            .collect();

        Ok(SinkWrite::Set {
            key: dataset_key(instance, "TypeAndBytes"),
            value: to_json("TypeAndBytes", &data)?,
        })
    }

    fn total_bytes_and_num(&self, counter: &Counter, instance: &str) -> SinkResult<SinkWrite> {
        let report = counter.type_report();
        let data = TotalJson {
            totle_num: report.total_num,
            totle_bytes: report.total_bytes,
        };

        Ok(SinkWrite::Set {
            key: dataset_key(instance, "TotalBytesAndNum"),
            value: to_json("TotalBytesAndNum", &data)?,
        })
    }

    fn len_level_count(&self, counter: &Counter, instance: &str) -> SinkResult<SinkWrite> {
        let mut data: BTreeMap<String, BTreeMap<String, SizeJson>> = BTreeMap::new();
        for tier in counter.length_tier_report() {
            data.entry(tier.pair.value_type)
                .or_default()
                .insert(tier.pair.key, SizeJson::new(tier.num, tier.bytes));
        }

        Ok(SinkWrite::Set {
            key: dataset_key(instance, "LenLevelCount"),
            value: to_json("LenLevelCount", &data)?,
        })
    }
}
