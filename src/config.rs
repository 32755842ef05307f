//! Configuration types for rdb-memaudit
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Engine and export settings shared by every subcommand
//! - Validation into a runtime [`AuditConfig`]

use crate::counter::{CounterConfig, LengthTiers, DEFAULT_SEPARATORS, LARGEST_PREFIXES_CAPACITY, LARGEST_RECORDS_CAPACITY};
use crate::error::ConfigError;
use crate::export::{ExportPolicy, DEFAULT_LARGEST_ENTRIES, DEFAULT_PREFIX_MIN_BYTES, DEFAULT_PREFIX_PER_TYPE};
use crate::sink::DEFAULT_REDIS_URL;
use crate::stream::DEFAULT_CHANNEL_SIZE;
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Minimum record channel capacity
const MIN_CHANNEL_SIZE: usize = 1;

/// Memory usage auditor for Redis snapshots
#[derive(Parser, Debug, Clone)]
#[command(
    name = "rdb-memaudit",
    version,
    about = "Memory usage auditor for Redis snapshots",
    long_about = "Consumes decoded snapshot records (newline-delimited JSON) and reports the largest keys,\n\
                  the key-prefix groups using the most memory, element-count tiers and per-type totals.\n\n\
                  Results are stored in Redis under '<instance>:<Dataset>' keys.",
    after_help = "EXAMPLES:\n    \
        rdb-memaudit analyze dump.jsonl --instance cache:6379\n    \
        rdb-memaudit analyze dump.jsonl --instance cache:6379 --no-export --top 50\n    \
        rdb-memaudit --redis redis://stats:6328 serve --port 8080"
)]
pub struct CliArgs {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,

    /// Redis URL where statistics are stored
    #[arg(long, env = "REDIS_URL", default_value = DEFAULT_REDIS_URL, global = true)]
    pub redis: String,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Analyze one record file and export the statistics
    Analyze {
        /// Newline-delimited JSON records produced by a snapshot decoder
        #[arg(value_name = "RECORDS")]
        input: PathBuf,

        /// Instance identifier used to namespace the results (e.g. namespace:port)
        #[arg(long, value_name = "ID")]
        instance: String,

        /// Print the report instead of writing to Redis
        #[arg(long)]
        no_export: bool,

        /// Rows per section in the printed report
        #[arg(short = 'n', long, default_value = "20", value_name = "NUM")]
        top: usize,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Serve the HTTP job submission endpoint
    Serve {
        /// Bind address
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,

        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,

        #[command(flatten)]
        engine: EngineArgs,
    },
}

/// Engine and export tuning shared by subcommands
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Characters that separate key segments
    #[arg(long, default_value = DEFAULT_SEPARATORS, value_name = "CHARS")]
    pub separators: String,

    /// Element-count tier thresholds, strictly increasing
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "100,1000,10000,100000,1000000",
        value_name = "LIST"
    )]
    pub tiers: Vec<u64>,

    /// Record channel capacity between reader and counter
    #[arg(long, default_value_t = DEFAULT_CHANNEL_SIZE, value_name = "NUM")]
    pub channel_size: usize,

    /// Largest records written per instance
    #[arg(long, default_value_t = DEFAULT_LARGEST_ENTRIES, value_name = "NUM")]
    pub largest_entries: usize,

    /// Prefixes at least this large are always written
    #[arg(long, default_value_t = DEFAULT_PREFIX_MIN_BYTES, value_name = "BYTES")]
    pub prefix_min_bytes: u64,

    /// Smaller prefixes are written until a type has this many
    #[arg(long, default_value_t = DEFAULT_PREFIX_PER_TYPE, value_name = "NUM")]
    pub prefix_per_type: usize,
}

impl Default for EngineArgs {
    fn default() -> Self {
        Self {
            separators: DEFAULT_SEPARATORS.to_string(),
            tiers: crate::counter::DEFAULT_TIERS.to_vec(),
            channel_size: DEFAULT_CHANNEL_SIZE,
            largest_entries: DEFAULT_LARGEST_ENTRIES,
            prefix_min_bytes: DEFAULT_PREFIX_MIN_BYTES,
            prefix_per_type: DEFAULT_PREFIX_PER_TYPE,
        }
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Counter settings
    pub counter: CounterConfig,

    /// Export limits
    pub export: ExportPolicy,

    /// Record channel capacity
    pub channel_size: usize,

    /// Redis URL for the statistics store
    pub redis_url: String,
}

impl AuditConfig {
    /// Validate engine arguments
    pub fn from_args(engine: &EngineArgs, redis_url: &str) -> Result<Self, ConfigError> {
        if engine.separators.is_empty() {
            return Err(ConfigError::EmptySeparators);
        }

        if engine.channel_size < MIN_CHANNEL_SIZE {
            return Err(ConfigError::InvalidChannelSize {
                size: engine.channel_size,
                min: MIN_CHANNEL_SIZE,
            });
        }

        let tiers = LengthTiers::new(engine.tiers.clone())?;

        Ok(Self {
            counter: CounterConfig {
                separators: engine.separators.clone(),
                tiers,
                records_capacity: LARGEST_RECORDS_CAPACITY,
                prefixes_capacity: LARGEST_PREFIXES_CAPACITY,
            },
            export: ExportPolicy {
                largest_entries: engine.largest_entries.min(LARGEST_RECORDS_CAPACITY),
                prefix_min_bytes: engine.prefix_min_bytes,
                prefix_per_type: engine.prefix_per_type,
            },
            channel_size: engine.channel_size,
            redis_url: redis_url.to_string(),
        })
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            counter: CounterConfig::default(),
            export: ExportPolicy::default(),
            channel_size: DEFAULT_CHANNEL_SIZE,
            redis_url: DEFAULT_REDIS_URL.to_string(),
        }
    }
}

/// Check that an instance identifier can namespace Redis keys
pub fn validate_instance(instance: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidInstance {
        instance: instance.to_string(),
        reason: reason.to_string(),
    };

    if instance.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if instance.chars().any(char::is_whitespace) {
        return Err(invalid("must not contain whitespace"));
    }
    Ok(())
}

/// Check that the record file exists before starting a job
pub fn validate_input(path: &Path) -> Result<(), ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::InvalidInputPath {
            path: path.to_path_buf(),
            reason: "not a readable file".to_string(),
        });
    }
    Ok(())
}

/// Parse the server bind address
pub fn bind_address(bind: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    let addr = format!("{}:{}", bind, port);
    addr.parse().map_err(|e: std::net::AddrParseError| ConfigError::InvalidBindAddress {
        addr,
        reason: e.to_string(),
    })
}
