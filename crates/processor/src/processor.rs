//! The commit-ordering processor.
//!
//! One consumer thread owns the per-session bookkeeping and reconciles three
//! producer streams: client requests (bounded queue), Raft commit
//! notifications, and Raft failure reports. Per iteration it
//!
//! 1. waits until any input is non-empty or shutdown is requested,
//! 2. drains the error ledger into failure responses,
//! 3. ingests queued requests (forwarding writes to the Raft layer),
//! 4. dispatches reads that are not blocked behind an in-flight write,
//! 5. dispatches committed writes in log order, releasing each session's
//!    newly unblocked reads as its write head retires.
//!
//! For every session the store sees requests in client submission order;
//! a write in flight for one session never blocks another session.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, error, info, trace, warn};

use rookery_store::queue::ThreadSafeQueue;
use rookery_store::{KeeperStore, ResponsesQueue};
use rookery_types::config::ProcessorConfig;
use rookery_types::{ErrorCode, RaftResultCode, RequestForSession, ResponseForSession};

use crate::error::ProcessorError;
use crate::ledger::{CommitError, CommitErrorLedger};
use crate::queue::RequestsQueue;

/// Forwarding seam to the Raft layer.
///
/// The server owns the processor and installs a non-owning back reference
/// after construction; failures come back asynchronously through
/// [`CommitProcessor::on_error`], so `propose` itself is fire-and-forget.
pub trait RaftClient: Send + Sync {
    /// Submits a write request to the Raft log.
    fn propose(&self, request: &RequestForSession);
}

struct Shared {
    requests_queue: RequestsQueue,
    committed_queue: ThreadSafeQueue<RequestForSession>,
    errors: CommitErrorLedger,
    responses: Arc<ResponsesQueue>,
    store: Arc<KeeperStore>,
    raft: RwLock<Option<Weak<dyn RaftClient>>>,
    shutdown_called: AtomicBool,
    wakeup: Mutex<()>,
    wakeup_cv: Condvar,
    operation_timeout: Duration,
}

impl Shared {
    /// Wakes the consumer. The wakeup mutex is taken so a notify can never
    /// slip between the consumer's predicate check and its wait.
    fn notify(&self) {
        let _guard = self.wakeup.lock();
        self.wakeup_cv.notify_all();
    }
}

/// Merges client requests and Raft commit notifications into per-session
/// in-order dispatch to the store.
pub struct CommitProcessor {
    shared: Arc<Shared>,
    main_thread: Mutex<Option<JoinHandle<()>>>,
}

impl CommitProcessor {
    /// Creates the processor and starts its consumer thread.
    pub fn new(
        store: Arc<KeeperStore>,
        responses: Arc<ResponsesQueue>,
        config: &ProcessorConfig,
    ) -> Self {
        let shared = Arc::new(Shared {
            requests_queue: RequestsQueue::new(config.request_queue_capacity),
            committed_queue: ThreadSafeQueue::new(),
            errors: CommitErrorLedger::new(),
            responses,
            store,
            raft: RwLock::new(None),
            shutdown_called: AtomicBool::new(false),
            wakeup: Mutex::new(()),
            wakeup_cv: Condvar::new(),
            operation_timeout: Duration::from_millis(config.operation_timeout_ms),
        });

        let worker_shared = Arc::clone(&shared);
        let handle = std::thread::spawn(move || Worker::new(worker_shared).run());

        Self { shared, main_thread: Mutex::new(Some(handle)) }
    }

    /// Installs the back reference to the Raft layer.
    ///
    /// Writes ingested before this is called are not forwarded; the server
    /// wires the reference up before accepting client connections.
    pub fn set_raft_client(&self, client: Weak<dyn RaftClient>) {
        *self.shared.raft.write() = Some(client);
    }

    /// Enqueues a client request.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::ShuttingDown`] after shutdown has begun and
    /// [`ProcessorError::QueueFull`] if the bounded queue stays full past
    /// the operation timeout.
    pub fn process_request(&self, request: RequestForSession) -> Result<(), ProcessorError> {
        if self.shared.shutdown_called.load(Ordering::Acquire) {
            return Err(ProcessorError::ShuttingDown);
        }
        self.shared.requests_queue.push_timeout(request, self.shared.operation_timeout)?;
        self.shared.notify();
        Ok(())
    }

    /// Delivers a Raft commit notification.
    ///
    /// Invoked by the state-machine layer in log order; the processor never
    /// reorders commits.
    pub fn commit(&self, request: RequestForSession) {
        if self.shared.shutdown_called.load(Ordering::Acquire) {
            return;
        }
        self.shared.committed_queue.push(request);
        self.shared.notify();
    }

    /// Records a Raft failure for a locally submitted request.
    pub fn on_error(&self, session_id: i64, xid: i32, accepted: bool, code: RaftResultCode) {
        if self.shared.shutdown_called.load(Ordering::Acquire) {
            return;
        }
        self.shared.errors.insert(session_id, xid, CommitError { accepted, code });
        self.shared.notify();
    }

    /// Stops the consumer thread and fails whatever is still queued.
    ///
    /// Idempotent. Requests remaining in the request queue each receive a
    /// synthetic `SessionExpired` response with `zxid = 0`.
    pub fn shutdown(&self) {
        if self.shared.shutdown_called.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.notify();

        let handle = self.main_thread.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("commit processor thread panicked before shutdown");
            }
        }

        let mut drained = 0usize;
        while let Some(request) = self.shared.requests_queue.try_pop() {
            let response = request.make_response(ErrorCode::SessionExpired, 0);
            self.shared
                .responses
                .push(ResponseForSession { session_id: request.session_id, response });
            drained += 1;
        }
        info!(drained, "commit processor shut down");
    }
}

impl Drop for CommitProcessor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Consumer-thread state: all requests seen but not yet dispatched, in
/// arrival order per session, plus the write-only subset whose head is each
/// session's earliest in-flight write.
struct Worker {
    shared: Arc<Shared>,
    pending_requests: HashMap<i64, VecDeque<RequestForSession>>,
    pending_write_requests: HashMap<i64, VecDeque<RequestForSession>>,
}

impl Worker {
    fn new(shared: Arc<Shared>) -> Self {
        Self { shared, pending_requests: HashMap::new(), pending_write_requests: HashMap::new() }
    }

    fn run(mut self) {
        debug!("commit processor thread started");
        loop {
            self.wait_for_work();
            if self.shared.shutdown_called.load(Ordering::Acquire) {
                debug!("commit processor thread exiting on shutdown");
                return;
            }
            if let Err(violation) = self.process_iteration() {
                // A bookkeeping violation means per-session ordering can no
                // longer be trusted; stop dispatching rather than corrupt
                // the store.
                error!(error = %violation, "fatal commit ordering violation, stopping processor");
                return;
            }
        }
    }

    fn wait_for_work(&self) {
        let shared = &self.shared;
        let mut guard = shared.wakeup.lock();
        while !shared.shutdown_called.load(Ordering::Acquire)
            && shared.requests_queue.is_empty()
            && shared.committed_queue.is_empty()
            && shared.errors.is_empty()
        {
            shared.wakeup_cv.wait(&mut guard);
        }
    }

    fn process_iteration(&mut self) -> Result<(), ProcessorError> {
        self.drain_errors()?;
        self.ingest_requests();

        let sessions: Vec<i64> = self.pending_requests.keys().copied().collect();
        for session_id in sessions {
            self.dispatch_ready_reads(session_id)?;
        }

        self.dispatch_commits()
    }

    /// Fails every request named by the error ledger and removes it from the
    /// per-session bookkeeping.
    fn drain_errors(&mut self) -> Result<(), ProcessorError> {
        for (session_id, xid, commit_error) in self.shared.errors.take_all() {
            let position = self
                .pending_requests
                .get(&session_id)
                .and_then(|requests| requests.iter().position(|r| r.xid == xid));
            let Some(position) = position else {
                return Err(ProcessorError::LogicViolation {
                    session_id,
                    expected_xid: None,
                    observed_xid: Some(xid),
                    detail: "error ledger entry has no matching pending request".to_string(),
                });
            };

            let mut removed = None;
            if let Some(requests) = self.pending_requests.get_mut(&session_id) {
                removed = requests.remove(position);
                if requests.is_empty() {
                    self.pending_requests.remove(&session_id);
                }
            }
            if let Some(writes) = self.pending_write_requests.get_mut(&session_id) {
                if let Some(write_position) = writes.iter().position(|r| r.xid == xid) {
                    writes.remove(write_position);
                }
                if writes.is_empty() {
                    self.pending_write_requests.remove(&session_id);
                }
            }

            let Some(request) = removed else {
                continue;
            };

            let code = if commit_error.code == RaftResultCode::Timeout {
                ErrorCode::OperationTimeout
            } else {
                ErrorCode::ConnectionLoss
            };
            warn!(
                session_id,
                xid,
                accepted = commit_error.accepted,
                raft_code = ?commit_error.code,
                "raft rejected request, failing it back to the client"
            );
            self.shared.responses.push(ResponseForSession {
                session_id,
                response: request.make_response(code, 0),
            });
        }
        Ok(())
    }

    /// Moves everything currently in the request queue into the per-session
    /// lists, forwarding writes to the Raft layer.
    fn ingest_requests(&mut self) {
        let available = self.shared.requests_queue.len();
        for _ in 0..available {
            let Some(request) = self.shared.requests_queue.try_pop() else {
                break;
            };
            trace!(
                session_id = request.session_id,
                xid = request.xid,
                op = request.request.op_name(),
                "ingested request"
            );

            if !request.request.is_read() {
                self.pending_write_requests
                    .entry(request.session_id)
                    .or_default()
                    .push_back(request.clone());

                let client = self.shared.raft.read().as_ref().and_then(Weak::upgrade);
                match client {
                    Some(client) => client.propose(&request),
                    None => trace!(
                        session_id = request.session_id,
                        xid = request.xid,
                        "no raft client installed, write awaits replicated commit"
                    ),
                }
            }
            self.pending_requests.entry(request.session_id).or_default().push_back(request);
        }
    }

    /// Dispatches queued requests for one session up to its first in-flight
    /// write. Everything ahead of the write head must be a read.
    fn dispatch_ready_reads(&mut self, session_id: i64) -> Result<(), ProcessorError> {
        loop {
            let write_head_xid = self
                .pending_write_requests
                .get(&session_id)
                .and_then(|writes| writes.front())
                .map(|r| r.xid);

            let ready = {
                let Some(requests) = self.pending_requests.get_mut(&session_id) else {
                    return Ok(());
                };
                match requests.front() {
                    None => None,
                    Some(front) if write_head_xid.is_some_and(|w| front.xid >= w) => None,
                    Some(_) => requests.pop_front(),
                }
            };

            let Some(request) = ready else {
                if self.pending_requests.get(&session_id).is_some_and(VecDeque::is_empty) {
                    self.pending_requests.remove(&session_id);
                }
                return Ok(());
            };

            if !request.request.is_read() {
                return Err(ProcessorError::LogicViolation {
                    session_id,
                    expected_xid: write_head_xid,
                    observed_xid: Some(request.xid),
                    detail: "request ahead of the session's write head is not a read".to_string(),
                });
            }

            trace!(session_id, xid = request.xid, "dispatching read");
            self.shared.store.process_request(&self.shared.responses, &request, true, true);
        }
    }

    /// Dispatches every available commit notification in log order.
    fn dispatch_commits(&mut self) -> Result<(), ProcessorError> {
        let available = self.shared.committed_queue.len();
        for _ in 0..available {
            let Some(committed) = self.shared.committed_queue.try_pop() else {
                break;
            };
            let session_id = committed.session_id;

            let write_head_xid = self
                .pending_write_requests
                .get(&session_id)
                .and_then(|writes| writes.front())
                .map(|r| r.xid);

            let Some(write_head_xid) = write_head_xid else {
                // No local write in flight for this session: the commit
                // originated on a peer and is replayed here.
                trace!(session_id, xid = committed.xid, "dispatching replicated commit");
                self.shared.store.process_request(&self.shared.responses, &committed, true, false);
                continue;
            };

            if write_head_xid != committed.xid {
                return Err(ProcessorError::LogicViolation {
                    session_id,
                    expected_xid: Some(write_head_xid),
                    observed_xid: Some(committed.xid),
                    detail: "committed write does not match the pending write head".to_string(),
                });
            }
            let request_head_xid = self
                .pending_requests
                .get(&session_id)
                .and_then(|requests| requests.front())
                .map(|r| r.xid);
            if request_head_xid != Some(committed.xid) {
                return Err(ProcessorError::LogicViolation {
                    session_id,
                    expected_xid: request_head_xid,
                    observed_xid: Some(committed.xid),
                    detail: "committed write does not match the pending request head".to_string(),
                });
            }

            trace!(session_id, xid = committed.xid, "dispatching committed write");
            self.shared.store.process_request(&self.shared.responses, &committed, true, false);

            if let Some(writes) = self.pending_write_requests.get_mut(&session_id) {
                writes.pop_front();
                if writes.is_empty() {
                    self.pending_write_requests.remove(&session_id);
                }
            }
            if let Some(requests) = self.pending_requests.get_mut(&session_id) {
                requests.pop_front();
                if requests.is_empty() {
                    self.pending_requests.remove(&session_id);
                }
            }

            // Retiring the write head may unblock reads queued behind it;
            // release them before the next commit so the head invariant
            // holds for back-to-back commits on one session.
            self.dispatch_ready_reads(session_id)?;
        }
        Ok(())
    }
}
