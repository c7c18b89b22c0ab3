//! In-memory coordination store for Rookery.
//!
//! [`KeeperStore`] holds the state that the snapshot engine persists and that
//! the commit-ordering processor dispatches into:
//!
//! - **Session table**: session id → negotiated timeout, plus the session id
//!   counter (both under the session lock)
//! - **Auth table**: session id → authenticated identities (auth lock)
//! - **Ephemerals index**: session id → set of owned node paths
//! - **ACL map**: interned ACL lists keyed by a dense id
//! - **Auxiliary maps**: string→string and string→u64 metadata persisted
//!   alongside the data tree
//!
//! Each entity has its own `parking_lot::Mutex`; the snapshot serializers
//! take an entity's lock for the duration of that entity's pass, so snapshot
//! creation never observes a torn map. The znode trie itself lives behind the
//! `process_request` seam — this crate keeps only the flat node table needed
//! to answer requests and maintain the ephemerals index.

pub mod acl_map;
pub mod queue;
pub mod store;

pub use acl_map::AclMap;
pub use queue::ResponsesQueue;
pub use store::{KeeperStore, Node, SessionTable};
