//! Client request and response model.
//!
//! Requests are a tagged variant rather than a trait hierarchy: every
//! consumer in the pipeline needs the same small capability surface
//! (`is_read`, the op name for logging, response synthesis), and a closed
//! enum keeps that surface exhaustively matched.

use crate::acl::Acl;

/// ZooKeeper client error codes (wire values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// Success.
    Ok = 0,
    /// The operation timed out before Raft accepted it.
    OperationTimeout = -7,
    /// The connection to the quorum was lost mid-operation.
    ConnectionLoss = -4,
    /// Target node does not exist.
    NoNode = -101,
    /// Version check failed on a conditional write.
    BadVersion = -103,
    /// Node already exists.
    NodeExists = -110,
    /// The session has expired.
    SessionExpired = -112,
}

impl ErrorCode {
    /// Wire value of this code.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Raft client result codes, as reported by the consensus library when a
/// locally submitted batch fails to be accepted or times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum RaftResultCode {
    /// The batch was committed.
    Ok = 0,
    /// The batch was cancelled, typically by a leadership change.
    Cancelled = -1,
    /// The batch timed out waiting for quorum.
    Timeout = -2,
    /// The batch was never submitted to the log.
    NotSubmitted = -3,
    /// Catch-all failure.
    Failed = -32768,
}

/// A client operation, tagged read or write by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Create a node at `path`.
    Create {
        /// Absolute node path.
        path: String,
        /// Initial node payload.
        data: Vec<u8>,
        /// ACL list applied to the node.
        acl: Vec<Acl>,
        /// Whether the node's lifetime is bound to the creating session.
        ephemeral: bool,
        /// Whether a monotonic zero-padded suffix is appended to `path` at
        /// creation.
        sequential: bool,
    },
    /// Read a node's payload.
    GetData {
        /// Absolute node path.
        path: String,
    },
    /// Replace a node's payload, optionally guarded by `version`.
    SetData {
        /// Absolute node path.
        path: String,
        /// New payload.
        data: Vec<u8>,
        /// Expected node version, or -1 to skip the check.
        version: i32,
    },
    /// Check node existence.
    Exists {
        /// Absolute node path.
        path: String,
    },
    /// Remove a node, optionally guarded by `version`.
    Remove {
        /// Absolute node path.
        path: String,
        /// Expected node version, or -1 to skip the check.
        version: i32,
    },
    /// List the children of a node.
    List {
        /// Absolute node path.
        path: String,
    },
    /// Replace a node's ACL list.
    SetAcl {
        /// Absolute node path.
        path: String,
        /// New ACL list.
        acl: Vec<Acl>,
        /// Expected ACL version, or -1 to skip the check.
        version: i32,
    },
    /// Read a node's ACL list.
    GetAcl {
        /// Absolute node path.
        path: String,
    },
}

impl Request {
    /// Whether this operation only observes state.
    ///
    /// Read requests are dispatched locally; write requests go through the
    /// Raft log and are dispatched on commit.
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Request::GetData { .. }
                | Request::Exists { .. }
                | Request::List { .. }
                | Request::GetAcl { .. }
        )
    }

    /// The node path this operation targets.
    pub fn path(&self) -> &str {
        match self {
            Request::Create { path, .. }
            | Request::GetData { path }
            | Request::SetData { path, .. }
            | Request::Exists { path }
            | Request::Remove { path, .. }
            | Request::List { path }
            | Request::SetAcl { path, .. }
            | Request::GetAcl { path } => path,
        }
    }

    /// Short operation name for logging.
    pub fn op_name(&self) -> &'static str {
        match self {
            Request::Create { .. } => "create",
            Request::GetData { .. } => "get_data",
            Request::SetData { .. } => "set_data",
            Request::Exists { .. } => "exists",
            Request::Remove { .. } => "remove",
            Request::List { .. } => "list",
            Request::SetAcl { .. } => "set_acl",
            Request::GetAcl { .. } => "get_acl",
        }
    }
}

/// A client request bound to its session, as queued through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestForSession {
    /// Session the request arrived on.
    pub session_id: i64,
    /// Client-assigned transaction id, monotonic per session.
    pub xid: i32,
    /// The operation.
    pub request: Request,
}

impl RequestForSession {
    /// Synthesizes a response for this request with the given outcome.
    ///
    /// `zxid` is 0 for responses that never reached the store (failures and
    /// shutdown drains).
    pub fn make_response(&self, error: ErrorCode, zxid: i64) -> Response {
        Response { xid: self.xid, zxid, error }
    }
}

/// The header of a reply sent back to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    /// Echo of the request's xid.
    pub xid: i32,
    /// Transaction id assigned on commit; 0 if the request never committed.
    pub zxid: i64,
    /// Outcome code.
    pub error: ErrorCode,
}

/// A response bound to the session it must be delivered on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseForSession {
    /// Target session.
    pub session_id: i64,
    /// The reply.
    pub response: Response,
}
