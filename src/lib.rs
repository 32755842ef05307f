//! rdb-memaudit - Memory Usage Auditor for Redis Snapshots
//!
//! Consumes the records of a decoded Redis snapshot in a single pass and
//! reports where memory goes: the largest keys, the key-prefix groups that
//! use the most memory, element-count tiers and per-type totals. Results are
//! written back to Redis so dashboards can read them per instance.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   JSONL    ┌──────────────────┐
//! │ snapshot decoder │──────────▶│  record source   │  producer thread
//! └──────────────────┘            └────────┬─────────┘
//!                                          │ bounded channel
//!                                          ▼
//!                                 ┌──────────────────┐
//!                                 │     Counter      │  top-K records,
//!                                 │                  │  prefix/type/tier
//!                                 └────────┬─────────┘  aggregates
//!                                          │ finalize
//!                                          ▼
//!                                 ┌──────────────────┐
//!                                 │  StatsExporter   │──▶ Redis datasets
//!                                 └──────────────────┘    <instance>:<Dataset>
//! ```
//!
//! Jobs arrive either from the `analyze` subcommand or through the HTTP
//! submission service, which queues them and runs each one independently.
//!
//! # Example
//!
//! ```bash
//! # Analyze one file and store results for cache:6379
//! rdb-memaudit analyze dump.jsonl --instance cache:6379
//!
//! # Accept jobs over HTTP
//! rdb-memaudit serve --port 8080
//! curl 'http://localhost:8080/parse?namespace=cache&filepath=/data/dump.jsonl&port=6379'
//! ```

pub mod config;
pub mod counter;
pub mod error;
pub mod export;
pub mod job;
pub mod record;
pub mod report;
pub mod server;
pub mod sink;
pub mod source;
pub mod stream;

pub use config::{AuditConfig, CliArgs};
pub use counter::{Counter, CounterConfig};
pub use error::{AuditError, Result};
pub use export::{ExportPolicy, StatsExporter};
pub use job::{run_job, JobDispatcher, JobOutcome, Submission};
pub use record::Record;
pub use sink::{MemorySink, RedisSink, SinkWrite, StatsSink};
