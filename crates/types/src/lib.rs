//! Core types for the Rookery coordination service.
//!
//! This crate provides the foundational pieces shared by the store, the
//! snapshot engine, and the commit-ordering processor:
//! - The client request/response model (`Request`, `RequestForSession`,
//!   `Response`, `ResponseForSession`) and ZooKeeper error codes
//! - ACL and auth identity types with their wire encodings
//! - Little-endian wire encoding helpers shared with the client protocol
//! - The CRC-32 checksum primitive and the rolling-checksum combiner used by
//!   the snapshot file format
//! - Configuration structs with serde defaults
//! - Error types using snafu

pub mod acl;
pub mod checksum;
pub mod codec;
pub mod config;
pub mod error;
pub mod request;
pub mod wire;

// Re-export commonly used types at crate root
pub use acl::{Acl, AuthId};
pub use checksum::{chain_crc32, crc32};
pub use error::WireError;
pub use request::{
    ErrorCode, RaftResultCode, Request, RequestForSession, Response, ResponseForSession,
};
