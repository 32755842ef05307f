//! Record source
//!
//! Reads newline-delimited JSON records, as emitted by a snapshot decoder,
//! and feeds them into a record stream. Any failure ends the stream early;
//! the counter then reports on whatever it already received.

use crate::error::{SourceError, SourceResult};
use crate::record::Record;
use crate::stream::RecordSender;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// What a source produced before it stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    /// Lines read, including blank ones
    pub lines: u64,

    /// Records sent into the stream
    pub records: u64,
}

/// Decode records from `reader` and send them until EOF or the first error
///
/// The sender is consumed, so the stream closes when this returns.
pub fn send_records<R: Read>(reader: R, sender: RecordSender) -> SourceResult<SourceStats> {
    let mut stats = SourceStats::default();

    for line in BufReader::new(reader).lines() {
        stats.lines += 1;
        let line = line.map_err(|e| SourceError::ReadFailed {
            line: stats.lines,
            reason: e.to_string(),
        })?;

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record: Record = serde_json::from_str(line).map_err(|e| SourceError::Malformed {
            line: stats.lines,
            reason: e.to_string(),
        })?;

        sender.send(record)?;
        stats.records += 1;
    }

    Ok(stats)
}

/// Open `path` and send its records
pub fn read_records(path: &Path, sender: RecordSender) -> SourceResult<SourceStats> {
    let file = File::open(path).map_err(|e| SourceError::OpenFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    send_records(file, sender)
}

/// Run [`read_records`] on a dedicated producer thread
///
/// Errors are logged here as well as returned through the handle, since
/// the consumer only observes them as an early end of stream.
pub fn spawn_reader(path: PathBuf, sender: RecordSender) -> std::io::Result<JoinHandle<SourceResult<SourceStats>>> {
    thread::Builder::new()
        .name("record-source".into())
        .spawn(move || {
            let result = read_records(&path, sender);
            match &result {
                Ok(stats) => debug!(
                    path = %path.display(),
                    lines = stats.lines,
                    records = stats.records,
                    "record source finished"
                ),
                Err(e) => warn!(path = %path.display(), error = %e, "record source stopped early"),
            }
            result
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::record_channel;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const LINES: &str = concat!(
        r#"{"key":"a:1","type":"string","bytes":10,"num_of_elem":1}"#,
        "\n\n",
        r#"{"key":"b:2","type":"list","bytes":20,"num_of_elem":3}"#,
        "\n",
    );

    #[test]
    fn test_send_records_skips_blank_lines() {
        let (sender, stream) = record_channel(16);
        let stats = send_records(LINES.as_bytes(), sender).unwrap();
        assert_eq!(stats, SourceStats { lines: 3, records: 2 });

        let keys: Vec<_> = stream.map(|r| r.key).collect();
        assert_eq!(keys, vec!["a:1", "b:2"]);
    }

    #[test]
    fn test_malformed_line_closes_stream() {
        let input = format!("{}not json\n{}", LINES, LINES);
        let (sender, stream) = record_channel(16);
        let err = send_records(input.as_bytes(), sender).unwrap_err();
        assert!(matches!(err, SourceError::Malformed { line: 4, .. }));

        // records before the bad line still arrive, then the stream ends
        assert_eq!(stream.count(), 2);
    }

    #[test]
    fn test_missing_file() {
        let (sender, stream) = record_channel(1);
        let err = read_records(Path::new("/nonexistent/records.jsonl"), sender).unwrap_err();
        assert!(matches!(err, SourceError::OpenFailed { .. }));
        assert_eq!(stream.count(), 0);
    }

    #[test]
    fn test_spawned_reader() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(LINES.as_bytes()).unwrap();

        let (sender, stream) = record_channel(1);
        let handle = spawn_reader(file.path().to_path_buf(), sender).unwrap();
        assert_eq!(stream.count(), 2);
        assert_eq!(handle.join().unwrap().unwrap().records, 2);
    }
}
