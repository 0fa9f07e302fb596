//! Append-only logs of what happened in each cycle.
//!
//! Records are owned by the [crate::Arbiter] and are the only view an external reporter
//! gets of a run. Every vector grows by exactly one entry per cycle.

use crate::queue::Status;
use serde::{Deserialize, Serialize};

/// Per-cycle history of a single queue.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRecord {
    /// Bytes sent since the start of the run.
    pub total: u64,
    /// Bytes sent in each cycle.
    pub sent: Vec<u64>,
    /// Messages still pending at the end of each cycle.
    pub backlog_count: Vec<usize>,
    /// Bytes still pending at the end of each cycle.
    pub backlog_size: Vec<u64>,
}

impl QueueRecord {
    pub(crate) fn push(&mut self, sent: u64, status: Status) {
        self.total = self.total.saturating_add(sent);
        self.sent.push(sent);
        self.backlog_count.push(status.count);
        self.backlog_size.push(status.size);
    }
}

/// Per-cycle history of the shared port.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRecord {
    /// Bytes sent across all queues in each cycle.
    pub sent: Vec<u64>,
    /// Bytes pending across all queues at the end of each cycle.
    pub remaining: Vec<u64>,
}

impl PortRecord {
    pub(crate) fn push(&mut self, sent: u64, remaining: u64) {
        self.sent.push(sent);
        self.remaining.push(remaining);
    }

    /// Number of cycles recorded.
    pub fn len(&self) -> usize {
        self.sent.len()
    }

    /// Whether no cycle has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }
}
