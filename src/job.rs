//! Analysis jobs
//!
//! A job reads one record file, counts it with a fresh [`Counter`] and
//! exports the result under `namespace:port`. The reader and the counter
//! run on their own blocking threads joined by a bounded record stream.
//!
//! [`JobDispatcher`] queues validated submissions and runs each one as an
//! independent task, so a slow analysis never holds up request handling.

use crate::config::AuditConfig;
use crate::counter::Counter;
use crate::error::{AuditError, Result, SubmitError};
use crate::export::{ExportSummary, StatsExporter};
use crate::sink::StatsSink;
use crate::source::{self, SourceStats};
use crate::stream::record_channel;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Pending submissions held before the dispatcher applies backpressure
pub const JOB_QUEUE_SIZE: usize = 10;

static PORT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4,5}$").expect("Invalid port regex"));

/// A validated request to analyze one snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub namespace: String,
    pub path: PathBuf,
    pub port: String,
}

impl Submission {
    /// Validate raw submission fields
    ///
    /// The path must be absolute and exist; the port must be 4-5 digits.
    pub fn validate(namespace: &str, path: &str, port: &str) -> std::result::Result<Self, SubmitError> {
        let file = Path::new(path);
        if !file.is_absolute() || !file.exists() {
            return Err(SubmitError::InvalidPath {
                path: path.to_string(),
            });
        }

        if !PORT_REGEX.is_match(port) {
            return Err(SubmitError::InvalidPort {
                port: port.to_string(),
            });
        }

        Ok(Self {
            namespace: namespace.to_string(),
            path: file.to_path_buf(),
            port: port.to_string(),
        })
    }

    /// Instance identifier results are stored under
    pub fn instance(&self) -> String {
        format!("{}:{}", self.namespace, self.port)
    }
}

/// Reply to a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitResponse {
    pub ret: bool,
    pub message: String,
    pub code: u32,
}

impl SubmitResponse {
    pub fn accepted() -> Self {
        Self {
            ret: true,
            message: "submit ok".to_string(),
            code: 0,
        }
    }
}

impl From<&SubmitError> for SubmitResponse {
    fn from(err: &SubmitError) -> Self {
        Self {
            ret: false,
            message: err.to_string(),
            code: err.code(),
        }
    }
}

/// Result of one finished job
#[derive(Debug)]
pub struct JobOutcome {
    pub id: Uuid,
    pub instance: String,
    pub records: u64,
    /// Finalized counter, kept for local reporting
    pub counter: Counter,
    /// Reader statistics, or why the reader stopped early
    pub source: std::result::Result<SourceStats, String>,
    pub export: ExportSummary,
    pub duration: Duration,
}

/// Count one record file and export it under `instance`
///
/// Input errors end the stream early and are reported in the outcome; sink
/// errors fail the job.
pub async fn run_job(
    path: PathBuf,
    instance: String,
    config: &AuditConfig,
    sink: &dyn StatsSink,
) -> Result<JobOutcome> {
    let id = Uuid::new_v4();
    let start = Instant::now();
    info!(%id, instance = %instance, path = %path.display(), "job started");

    let (counter, source) = count_file(id, path, config).await?;

    if let Err(reason) = &source {
        warn!(%id, reason = %reason, "input ended early, exporting partial statistics");
    }

    let export = StatsExporter::new(config.export)
        .export(&counter, &instance, sink)
        .await?;

    let outcome = JobOutcome {
        id,
        instance,
        records: counter.records_seen(),
        counter,
        source,
        export,
        duration: start.elapsed(),
    };

    info!(
        %id,
        instance = %outcome.instance,
        records = outcome.records,
        elapsed_ms = outcome.duration.as_millis() as u64,
        "job finished"
    );
    Ok(outcome)
}

/// Run reader and counter to completion on blocking threads
pub async fn count_file(
    id: Uuid,
    path: PathBuf,
    config: &AuditConfig,
) -> Result<(Counter, std::result::Result<SourceStats, String>)> {
    let (sender, stream) = record_channel(config.channel_size);
    let reader = source::spawn_reader(path, sender)?;
    let counter_config = config.counter.clone();

    tokio::task::spawn_blocking(move || {
        let stream_stats = stream.stats();
        let mut counter = Counter::new(counter_config);
        counter.consume(stream);
        debug!(
            %id,
            sent = stream_stats.sent(),
            received = stream_stats.received(),
            "record stream drained"
        );

        // stream is closed, so the reader has returned or is about to
        let source = match reader.join() {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err("record reader panicked".to_string()),
        };
        (counter, source)
    })
    .await
    .map_err(|e| AuditError::JobAborted {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

/// Queue of submissions feeding concurrently running jobs
#[derive(Clone)]
pub struct JobDispatcher {
    sender: mpsc::Sender<Submission>,
}

impl JobDispatcher {
    /// Start the dispatch loop
    ///
    /// The returned handle completes once every dispatcher clone is dropped
    /// and all running jobs have finished.
    pub fn spawn(config: Arc<AuditConfig>, sink: Arc<dyn StatsSink>) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(JOB_QUEUE_SIZE);
        let handle = tokio::spawn(dispatch_loop(receiver, config, sink));
        (Self { sender }, handle)
    }

    /// Queue a validated submission
    pub async fn submit(&self, submission: Submission) -> std::result::Result<(), SubmitError> {
        self.sender
            .send(submission)
            .await
            .map_err(|_| SubmitError::QueueUnavailable)
    }
}

async fn dispatch_loop(
    mut receiver: mpsc::Receiver<Submission>,
    config: Arc<AuditConfig>,
    sink: Arc<dyn StatsSink>,
) {
    let mut jobs = JoinSet::new();

    loop {
        tokio::select! {
            next = receiver.recv() => match next {
                Some(submission) => {
                    let config = Arc::clone(&config);
                    let sink = Arc::clone(&sink);
                    jobs.spawn(async move {
                        let instance = submission.instance();
                        if let Err(e) = run_job(submission.path, instance.clone(), &config, sink.as_ref()).await {
                            error!(instance = %instance, error = %e, "job failed");
                        }
                    });
                }
                None => break,
            },
            Some(joined) = jobs.join_next(), if !jobs.is_empty() => log_join(joined),
        }
    }

    while let Some(joined) = jobs.join_next().await {
        log_join(joined);
    }
    info!("job dispatcher stopped");
}

fn log_join(joined: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, panicked = e.is_panic(), "job task did not complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::sink::{FailingSink, MemorySink};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn record_file(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn test_validate_submission() {
        let file = record_file(&[]);
        let path = file.path().to_str().unwrap();

        let submission = Submission::validate("cache", path, "6379").unwrap();
        assert_eq!(submission.instance(), "cache:6379");

        assert_eq!(
            Submission::validate("cache", "relative/dump.jsonl", "6379").unwrap_err().code(),
            1
        );
        assert_eq!(
            Submission::validate("cache", "/nonexistent/dump.jsonl", "6379").unwrap_err().code(),
            1
        );
        assert_eq!(Submission::validate("cache", path, "80").unwrap_err().code(), 2);
        assert_eq!(Submission::validate("cache", path, "123456").unwrap_err().code(), 2);
        assert_eq!(Submission::validate("cache", path, "63a9").unwrap_err().code(), 2);
    }

    #[test]
    fn test_submit_response_json() {
        let ok = serde_json::to_value(SubmitResponse::accepted()).unwrap();
        assert_eq!(ok, serde_json::json!({"ret": true, "message": "submit ok", "code": 0}));

        let err = SubmitError::InvalidPort { port: "1".into() };
        let rejected = SubmitResponse::from(&err);
        assert!(!rejected.ret);
        assert_eq!(rejected.code, 2);
    }

    #[tokio::test]
    async fn test_run_job_exports_results() {
        let file = record_file(&[
            r#"{"key":"user:1:cart","type":"list","bytes":400,"num_of_elem":150}"#,
            r#"{"key":"user:2:cart","type":"list","bytes":600,"num_of_elem":90}"#,
        ]);
        let sink = MemorySink::new();

        let outcome = run_job(
            file.path().to_path_buf(),
            "shop:6380".to_string(),
            &AuditConfig::default(),
            &sink,
        )
        .await
        .unwrap();

        assert_eq!(outcome.records, 2);
        assert_eq!(outcome.source.unwrap().records, 2);
        assert_eq!(outcome.export.largest_entries, 2);
        assert_eq!(
            sink.get("shop:6380:TotalBytesAndNum").unwrap(),
            r#"{"totleNum":2,"totleBytes":1000}"#
        );
    }

    #[tokio::test]
    async fn test_run_job_with_corrupt_input_exports_partial() {
        let file = record_file(&[
            r#"{"key":"a","type":"string","bytes":10,"num_of_elem":1}"#,
            "garbage",
            r#"{"key":"b","type":"string","bytes":10,"num_of_elem":1}"#,
        ]);
        let sink = MemorySink::new();

        let outcome = run_job(file.path().to_path_buf(), "i".into(), &AuditConfig::default(), &sink)
            .await
            .unwrap();

        assert_eq!(outcome.records, 1);
        assert!(outcome.source.is_err());
        assert_eq!(sink.list("i:LargestEntries").len(), 1);
    }

    #[tokio::test]
    async fn test_run_job_fails_on_sink_error() {
        let file = record_file(&[r#"{"key":"k:1","type":"string","bytes":3,"num_of_elem":1}"#]);
        let sink = FailingSink::new(1);

        let err = run_job(file.path().to_path_buf(), "ns:6379".into(), &AuditConfig::default(), &sink)
            .await
            .unwrap_err();

        assert!(matches!(err, AuditError::Sink(SinkError::Redis(_))));
        assert_eq!(sink.attempted(), vec!["ns:6379:LargestEntries"]);
        assert_eq!(sink.store(), Default::default());
    }

    #[tokio::test]
    async fn test_dispatcher_survives_failed_job() {
        let file = record_file(&[r#"{"key":"k","type":"set","bytes":9,"num_of_elem":1}"#]);
        let sink = Arc::new(FailingSink::new(1));

        let (dispatcher, handle) = JobDispatcher::spawn(Arc::new(AuditConfig::default()), sink.clone());
        for port in ["7001", "7002"] {
            let submission = Submission::validate("ns", file.path().to_str().unwrap(), port).unwrap();
            dispatcher.submit(submission).await.unwrap();
        }
        drop(dispatcher);
        handle.await.unwrap();

        // one job hit the failing first write, the other exported everything
        let store = sink.store();
        assert_eq!(store.strings.len(), 3);
    }

    #[tokio::test]
    async fn test_log_join_accepts_panicked_task() {
        let joined = tokio::spawn(async { panic!("job exploded") }).await;
        assert!(joined.as_ref().is_err_and(|e| e.is_panic()));
        log_join(joined);
        log_join(Ok(()));
    }

    #[tokio::test]
    async fn test_dispatcher_runs_jobs_concurrently() {
        let first = record_file(&[r#"{"key":"x","type":"hash","bytes":5,"num_of_elem":1}"#]);
        let second = record_file(&[r#"{"key":"y","type":"set","bytes":7,"num_of_elem":1}"#]);
        let sink = Arc::new(MemorySink::new());

        let (dispatcher, handle) = JobDispatcher::spawn(Arc::new(AuditConfig::default()), sink.clone());
        for (file, port) in [(&first, "7001"), (&second, "7002")] {
            let submission = Submission::validate("ns", file.path().to_str().unwrap(), port).unwrap();
            dispatcher.submit(submission).await.unwrap();
        }
        drop(dispatcher);
        handle.await.unwrap();

        assert!(sink.get("ns:7001:TypeAndBytes").unwrap().contains("hash"));
        assert!(sink.get("ns:7002:TypeAndBytes").unwrap().contains("set"));
    }
}
