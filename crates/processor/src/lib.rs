//! Commit-ordering processor.
//!
//! This crate reconciles two concurrent streams — locally submitted client
//! requests and Raft-committed entries — into a per-session FIFO order, so
//! each client observes its own writes before any subsequent read:
//!
//! - [`RequestsQueue`]: bounded multi-producer single-consumer queue fed by
//!   client connections
//! - [`CommitProcessor`]: the single consumer thread that classifies
//!   requests, forwards writes to the Raft layer, holds back reads behind
//!   in-flight writes, and dispatches committed writes to the store in log
//!   order
//! - [`CommitErrorLedger`]: Raft failures keyed by `(session_id, xid)`,
//!   drained by the processor into per-client failure responses
//!
//! A write in flight for one session never blocks another session; across
//! sessions only Raft commit order is guaranteed.

pub mod error;
pub mod ledger;
pub mod processor;
pub mod queue;

pub use error::ProcessorError;
pub use ledger::{CommitError, CommitErrorLedger};
pub use processor::{CommitProcessor, RaftClient};
pub use queue::RequestsQueue;
