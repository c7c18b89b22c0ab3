//! The coordination store: sessions, auth, ephemerals, ACLs, and the flat
//! node table behind the `process_request` seam.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::Mutex;
use tracing::trace;

use rookery_types::{AuthId, ErrorCode, Request, RequestForSession, ResponseForSession};

use crate::acl_map::AclMap;
use crate::queue::ResponsesQueue;

/// Session id → negotiated timeout, plus the id counter.
///
/// Both live under one lock: the snapshot session serializer captures the
/// counter and walks the table in a single critical section so the recorded
/// `next_session_id` is consistent with the serialized sessions.
#[derive(Debug, Default)]
pub struct SessionTable {
    /// Session id → timeout in milliseconds.
    pub session_and_timeout: HashMap<i64, i64>,
    /// Next session id to hand out.
    pub session_id_counter: i64,
}

/// A stored node. The production trie lives outside this crate; this flat
/// table carries just enough state to answer requests and keep the
/// ephemerals index consistent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Node payload.
    pub data: Vec<u8>,
    /// Interned ACL list id (see [`AclMap`]).
    pub acl_id: u64,
    /// Data version, bumped on every `set_data`.
    pub version: i32,
    /// Owning session for ephemeral nodes; 0 for persistent nodes.
    pub ephemeral_owner: i64,
}

/// The in-memory coordination store.
///
/// Every entity category has its own mutex. Snapshot serializers hold one
/// entity's lock for that entity's full pass; `process_request` takes locks
/// per operation in a fixed order (nodes → acl_map → ephemerals) so the two
/// never deadlock.
pub struct KeeperStore {
    /// Session table and id counter (session lock).
    pub sessions: Mutex<SessionTable>,
    /// Session id → authenticated identities (auth lock). When both the
    /// session lock and this lock are needed, the session lock is taken
    /// first.
    pub session_and_auth: Mutex<HashMap<i64, Vec<AuthId>>>,
    /// Session id → paths of ephemeral nodes it owns.
    pub ephemerals: Mutex<HashMap<i64, BTreeSet<String>>>,
    /// Interned ACL lists.
    pub acl_map: Mutex<AclMap>,
    /// Auxiliary string → string metadata, persisted in snapshots.
    pub string_map: Mutex<HashMap<String, String>>,
    /// Auxiliary string → u64 metadata, persisted in snapshots.
    pub int_map: Mutex<HashMap<String, u64>>,

    nodes: Mutex<HashMap<String, Node>>,
    zxid: AtomicI64,
    sequence: AtomicI64,
}

impl Default for KeeperStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeeperStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(SessionTable::default()),
            session_and_auth: Mutex::new(HashMap::new()),
            ephemerals: Mutex::new(HashMap::new()),
            acl_map: Mutex::new(AclMap::new()),
            string_map: Mutex::new(HashMap::new()),
            int_map: Mutex::new(HashMap::new()),
            nodes: Mutex::new(HashMap::new()),
            zxid: AtomicI64::new(0),
            sequence: AtomicI64::new(0),
        }
    }

    /// Allocates a new session with the given timeout and returns its id.
    pub fn create_session(&self, timeout_ms: i64) -> i64 {
        let mut sessions = self.sessions.lock();
        sessions.session_id_counter += 1;
        let id = sessions.session_id_counter;
        sessions.session_and_timeout.insert(id, timeout_ms);
        id
    }

    /// Attaches an authenticated identity to a session.
    pub fn add_auth(&self, session_id: i64, auth: AuthId) {
        self.session_and_auth.lock().entry(session_id).or_default().push(auth);
    }

    /// Last assigned transaction id.
    pub fn zxid(&self) -> i64 {
        self.zxid.load(Ordering::Acquire)
    }

    /// Looks up a node (test and tooling helper).
    pub fn get_node(&self, path: &str) -> Option<Node> {
        self.nodes.lock().get(path).cloned()
    }

    /// Number of stored nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.lock().len()
    }

    /// Applies a request and pushes exactly one response.
    ///
    /// Write requests that apply successfully are assigned the next zxid;
    /// reads and failed requests report the current zxid. Version checks are
    /// skipped when `ignore_version` is set (commit replay) or the request
    /// carries version -1.
    pub fn process_request(
        &self,
        responses: &ResponsesQueue,
        request_for_session: &RequestForSession,
        ignore_version: bool,
        is_local: bool,
    ) {
        let session_id = request_for_session.session_id;
        let (error, zxid) = self.apply(request_for_session, ignore_version);

        trace!(
            session_id,
            xid = request_for_session.xid,
            op = request_for_session.request.op_name(),
            error = error.as_i32(),
            zxid,
            is_local,
            "applied request"
        );

        responses.push(ResponseForSession {
            session_id,
            response: request_for_session.make_response(error, zxid),
        });
    }

    fn apply(&self, rfs: &RequestForSession, ignore_version: bool) -> (ErrorCode, i64) {
        let check_version = |expected: i32, actual: i32| -> bool {
            ignore_version || expected == -1 || expected == actual
        };

        match &rfs.request {
            Request::Create { path, data, acl, ephemeral, sequential } => {
                let mut nodes = self.nodes.lock();
                // Sequential suffixes come from a store-wide counter; the
                // per-parent numbering ZooKeeper derives from the parent's
                // cversion is owned by the tree layer.
                let path = if *sequential {
                    format!("{path}{:010}", self.sequence.fetch_add(1, Ordering::AcqRel))
                } else {
                    path.clone()
                };
                if nodes.contains_key(&path) {
                    return (ErrorCode::NodeExists, self.zxid());
                }
                let acl_id = self.acl_map.lock().intern(acl.clone());
                let ephemeral_owner = if *ephemeral { rfs.session_id } else { 0 };
                nodes.insert(
                    path.clone(),
                    Node { data: data.clone(), acl_id, version: 0, ephemeral_owner },
                );
                drop(nodes);
                if *ephemeral {
                    self.ephemerals.lock().entry(rfs.session_id).or_default().insert(path);
                }
                (ErrorCode::Ok, self.next_zxid())
            }

            Request::SetData { path, data, version } => {
                let mut nodes = self.nodes.lock();
                match nodes.get_mut(path) {
                    None => (ErrorCode::NoNode, self.zxid()),
                    Some(node) if !check_version(*version, node.version) => {
                        (ErrorCode::BadVersion, self.zxid())
                    }
                    Some(node) => {
                        node.data = data.clone();
                        node.version += 1;
                        (ErrorCode::Ok, self.next_zxid())
                    }
                }
            }

            Request::Remove { path, version } => {
                let mut nodes = self.nodes.lock();
                let owner = match nodes.get(path) {
                    None => return (ErrorCode::NoNode, self.zxid()),
                    Some(node) if !check_version(*version, node.version) => {
                        return (ErrorCode::BadVersion, self.zxid());
                    }
                    Some(node) => node.ephemeral_owner,
                };
                nodes.remove(path);
                drop(nodes);
                if owner != 0 {
                    let mut ephemerals = self.ephemerals.lock();
                    if let Some(paths) = ephemerals.get_mut(&owner) {
                        paths.remove(path);
                        if paths.is_empty() {
                            ephemerals.remove(&owner);
                        }
                    }
                }
                (ErrorCode::Ok, self.next_zxid())
            }

            Request::SetAcl { path, acl, version } => {
                let mut nodes = self.nodes.lock();
                match nodes.get_mut(path) {
                    None => (ErrorCode::NoNode, self.zxid()),
                    Some(node) if !check_version(*version, node.version) => {
                        (ErrorCode::BadVersion, self.zxid())
                    }
                    Some(node) => {
                        node.acl_id = self.acl_map.lock().intern(acl.clone());
                        (ErrorCode::Ok, self.next_zxid())
                    }
                }
            }

            Request::GetData { path } | Request::List { path } | Request::GetAcl { path } => {
                let nodes = self.nodes.lock();
                if nodes.contains_key(path) {
                    (ErrorCode::Ok, self.zxid())
                } else {
                    (ErrorCode::NoNode, self.zxid())
                }
            }

            // Exists reports Ok either way; absence shows in the reply body,
            // which is assembled by the connection layer.
            Request::Exists { .. } => (ErrorCode::Ok, self.zxid()),
        }
    }

    fn next_zxid(&self) -> i64 {
        self.zxid.fetch_add(1, Ordering::AcqRel) + 1
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use rookery_types::Acl;

    use super::*;

    fn rfs(session_id: i64, xid: i32, request: Request) -> RequestForSession {
        RequestForSession { session_id, xid, request }
    }

    #[test]
    fn test_create_then_get() {
        let store = KeeperStore::new();
        let responses = ResponsesQueue::new();

        store.process_request(
            &responses,
            &rfs(
                1,
                1,
                Request::Create {
                    path: "/a".to_string(),
                    data: b"v".to_vec(),
                    acl: vec![Acl::world_all()],
                    ephemeral: false,
                    sequential: false,
                },
            ),
            true,
            false,
        );
        store.process_request(&responses, &rfs(1, 2, Request::GetData { path: "/a".to_string() }), true, false);

        let create = responses.try_pop().unwrap();
        assert_eq!(create.response.error, ErrorCode::Ok);
        assert_eq!(create.response.zxid, 1);

        let get = responses.try_pop().unwrap();
        assert_eq!(get.response.error, ErrorCode::Ok);
        assert_eq!(get.response.zxid, 1);
    }

    #[test]
    fn test_duplicate_create_rejected() {
        let store = KeeperStore::new();
        let responses = ResponsesQueue::new();
        let create = rfs(
            1,
            1,
            Request::Create {
                path: "/a".to_string(),
                data: vec![],
                acl: vec![],
                ephemeral: false,
                sequential: false,
            },
        );

        store.process_request(&responses, &create, true, false);
        store.process_request(&responses, &create, true, false);

        assert_eq!(responses.try_pop().unwrap().response.error, ErrorCode::Ok);
        assert_eq!(responses.try_pop().unwrap().response.error, ErrorCode::NodeExists);
    }

    #[test]
    fn test_sequential_create_appends_monotonic_suffix() {
        let store = KeeperStore::new();
        let responses = ResponsesQueue::new();
        let create = rfs(
            1,
            1,
            Request::Create {
                path: "/queue/item-".to_string(),
                data: vec![],
                acl: vec![],
                ephemeral: false,
                sequential: true,
            },
        );

        store.process_request(&responses, &create, true, false);
        store.process_request(&responses, &create, true, false);

        assert_eq!(responses.try_pop().unwrap().response.error, ErrorCode::Ok);
        assert_eq!(responses.try_pop().unwrap().response.error, ErrorCode::Ok);
        assert!(store.get_node("/queue/item-0000000000").is_some());
        assert!(store.get_node("/queue/item-0000000001").is_some());
        assert!(store.get_node("/queue/item-").is_none());
    }

    #[test]
    fn test_ephemeral_create_registers_owner() {
        let store = KeeperStore::new();
        let responses = ResponsesQueue::new();

        store.process_request(
            &responses,
            &rfs(
                42,
                1,
                Request::Create {
                    path: "/locks/a".to_string(),
                    data: vec![],
                    acl: vec![],
                    ephemeral: true,
                    sequential: false,
                },
            ),
            true,
            false,
        );

        let ephemerals = store.ephemerals.lock();
        assert!(ephemerals.get(&42).unwrap().contains("/locks/a"));
    }

    #[test]
    fn test_remove_ephemeral_unregisters_owner() {
        let store = KeeperStore::new();
        let responses = ResponsesQueue::new();

        store.process_request(
            &responses,
            &rfs(
                42,
                1,
                Request::Create {
                    path: "/locks/a".to_string(),
                    data: vec![],
                    acl: vec![],
                    ephemeral: true,
                    sequential: false,
                },
            ),
            true,
            false,
        );
        store.process_request(
            &responses,
            &rfs(42, 2, Request::Remove { path: "/locks/a".to_string(), version: -1 }),
            true,
            false,
        );

        assert!(store.ephemerals.lock().is_empty());
    }

    #[test]
    fn test_set_data_version_conflict() {
        let store = KeeperStore::new();
        let responses = ResponsesQueue::new();

        store.process_request(
            &responses,
            &rfs(
                1,
                1,
                Request::Create {
                    path: "/a".to_string(),
                    data: vec![],
                    acl: vec![],
                    ephemeral: false,
                    sequential: false,
                },
            ),
            true,
            false,
        );
        store.process_request(
            &responses,
            &rfs(1, 2, Request::SetData { path: "/a".to_string(), data: b"x".to_vec(), version: 5 }),
            false,
            false,
        );

        responses.try_pop();
        assert_eq!(responses.try_pop().unwrap().response.error, ErrorCode::BadVersion);
        assert_eq!(store.get_node("/a").unwrap().version, 0);
    }

    #[test]
    fn test_session_counter_monotonic() {
        let store = KeeperStore::new();
        let a = store.create_session(10_000);
        let b = store.create_session(10_000);
        assert!(b > a);
        assert_eq!(store.sessions.lock().session_id_counter, b);
    }

    #[test]
    fn test_zxid_advances_only_on_writes() {
        let store = KeeperStore::new();
        let responses = ResponsesQueue::new();

        store.process_request(&responses, &rfs(1, 1, Request::Exists { path: "/a".to_string() }), true, false);
        assert_eq!(store.zxid(), 0);

        store.process_request(
            &responses,
            &rfs(
                1,
                2,
                Request::Create {
                    path: "/a".to_string(),
                    data: vec![],
                    acl: vec![],
                    ephemeral: false,
                    sequential: false,
                },
            ),
            true,
            false,
        );
        assert_eq!(store.zxid(), 1);
    }
}
