//! Processor errors.

use snafu::Snafu;

/// Errors surfaced by the commit-ordering processor.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub))]
pub enum ProcessorError {
    /// The bounded request queue stayed full past the operation timeout.
    #[snafu(display("Request queue full (capacity {capacity})"))]
    QueueFull {
        /// Configured queue capacity.
        capacity: usize,
    },

    /// The processor is shutting down and no longer accepts work.
    #[snafu(display("Processor is shutting down"))]
    ShuttingDown,

    /// The processor's bookkeeping broke an invariant. Fatal: the consumer
    /// thread stops after logging the context.
    #[snafu(display(
        "Commit ordering violation for session {session_id}: {detail} \
         (expected xid {expected_xid:?}, observed xid {observed_xid:?})"
    ))]
    LogicViolation {
        /// Session whose bookkeeping is inconsistent.
        session_id: i64,
        /// Xid the per-session state expected, if any.
        expected_xid: Option<i32>,
        /// Xid actually observed, if any.
        observed_xid: Option<i32>,
        /// What was being checked.
        detail: String,
    },
}
