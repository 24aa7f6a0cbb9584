//! Install progress events
//!
//! One event announces the total before anything is written, then one event
//! per entry as it is started. The channel between the extraction worker and
//! the consumer is bounded: a slow consumer stalls the worker rather than
//! losing events.

use serde::Serialize;
use tokio::sync::mpsc;

/// `(processed, total)` pair reported during extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    /// Entries started so far
    pub processed: usize,
    /// Entries in the archive
    pub total: usize,
}

impl ProgressEvent {
    pub fn new(processed: usize, total: usize) -> Self {
        Self { processed, total }
    }

    /// The announcement sent before the first entry
    pub fn announce(total: usize) -> Self {
        Self::new(0, total)
    }

    pub fn is_complete(&self) -> bool {
        self.processed == self.total
    }

    /// Completion ratio in `0.0..=1.0`
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }
}

/// Receives progress events from the extraction worker
pub trait ProgressSink {
    fn emit(&mut self, event: ProgressEvent);
}

/// Collects events in memory
impl ProgressSink for Vec<ProgressEvent> {
    fn emit(&mut self, event: ProgressEvent) {
        self.push(event);
    }
}

/// Bounded channel sink.
///
/// Must be driven from a blocking context (the extraction worker runs on
/// tokio's blocking pool). Blocks while the channel is full.
impl ProgressSink for mpsc::Sender<ProgressEvent> {
    fn emit(&mut self, event: ProgressEvent) {
        if self.blocking_send(event).is_err() {
            tracing::debug!(
                "Progress receiver dropped, continuing at {}/{}",
                event.processed,
                event.total
            );
        }
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&mut self, _event: ProgressEvent) {}
}
