//! Single-producer, single-consumer record stream
//!
//! A bounded crossbeam channel between the record source and the counter.
//! The producer blocks when the channel is full; the consumer blocks until a
//! record arrives or the producer drops its end, which ends the stream.

use crate::error::{SourceError, SourceResult};
use crate::record::Record;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Default channel capacity
pub const DEFAULT_CHANNEL_SIZE: usize = 10_000;

/// Counters shared by both ends of a stream
#[derive(Debug, Default)]
pub struct StreamStats {
    /// Records accepted by the channel
    pub sent: AtomicU64,

    /// Records handed to the consumer
    pub received: AtomicU64,
}

impl StreamStats {
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}

/// Create a bounded record stream
pub fn record_channel(capacity: usize) -> (RecordSender, RecordStream) {
    let (sender, receiver) = bounded(capacity);
    let stats = Arc::new(StreamStats::default());

    (
        RecordSender {
            sender,
            stats: Arc::clone(&stats),
        },
        RecordStream { receiver, stats },
    )
}

/// Producer end; dropping it closes the stream
#[derive(Debug)]
pub struct RecordSender {
    sender: Sender<Record>,
    stats: Arc<StreamStats>,
}

impl RecordSender {
    /// Send a record, blocking while the channel is full
    pub fn send(&self, record: Record) -> SourceResult<()> {
        self.sender
            .send(record)
            .map_err(|_| SourceError::ConsumerGone)?;
        self.stats.sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Close the stream explicitly
    pub fn close(self) {}

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }
}

/// Consumer end; iterates until the producer closes
#[derive(Debug)]
pub struct RecordStream {
    receiver: Receiver<Record>,
    stats: Arc<StreamStats>,
}

impl RecordStream {
    /// Records currently buffered
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn stats(&self) -> Arc<StreamStats> {
        Arc::clone(&self.stats)
    }
}

impl Iterator for RecordStream {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        let record = self.receiver.recv().ok()?;
        self.stats.received.fetch_add(1, Ordering::Relaxed);
        Some(record)
    }
}
