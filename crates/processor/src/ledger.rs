//! Ledger of Raft failures awaiting the processor.
//!
//! The Raft client reports a failed or timed-out batch per request via
//! `on_error(session_id, xid, ...)`. Entries are keyed by a 128-bit
//! composite (session id in the upper 64 bits, xid in the lower 64) so
//! insertion and lookup are O(1); the processor is the sole consumer.

use std::collections::HashMap;

use parking_lot::Mutex;

use rookery_types::RaftResultCode;

/// Outcome of a failed Raft submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitError {
    /// Whether the batch was accepted into the log before failing.
    pub accepted: bool,
    /// Raft result code.
    pub code: RaftResultCode,
}

fn key(session_id: i64, xid: i32) -> u128 {
    ((session_id as u64 as u128) << 64) | (xid as i64 as u64 as u128)
}

fn split_key(key: u128) -> (i64, i32) {
    ((key >> 64) as u64 as i64, (key as u64 as i64) as i32)
}

/// Index of Raft failures keyed by `(session_id, xid)`.
#[derive(Debug, Default)]
pub struct CommitErrorLedger {
    errors: Mutex<HashMap<u128, CommitError>>,
}

impl CommitErrorLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure. A second failure for the same request overwrites
    /// the first; only one failure response is ever emitted per request.
    pub fn insert(&self, session_id: i64, xid: i32, error: CommitError) {
        self.errors.lock().insert(key(session_id, xid), error);
    }

    /// Whether any failures are pending.
    pub fn is_empty(&self) -> bool {
        self.errors.lock().is_empty()
    }

    /// Removes and returns all pending failures.
    pub fn take_all(&self) -> Vec<(i64, i32, CommitError)> {
        self.errors
            .lock()
            .drain()
            .map(|(key, error)| {
                let (session_id, xid) = split_key(key);
                (session_id, xid, error)
            })
            .collect()
    }
}
