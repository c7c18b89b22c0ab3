//! Snapshot engine: versioned, checksummed, batched snapshot object files.
//!
//! A snapshot **set** is a directory of object files, one per entity category
//! (sessions, ACLs, string map, int map, ephemerals) plus a postcard-encoded
//! manifest. Every object file shares the same layout:
//!
//! ```text
//! offset  size         content
//! 0       8            "SnapHead"          magic (ASCII)
//! 8       1            version             0x00..0x03 for V0..V3
//! 9       *            batches             repeated {header, body}
//! ...     12           header              {data_length:u32, data_crc:u32, pad:u32=0}
//! ...     data_length  body                batch body bytes
//! end-12  8            "SnapTail"          magic
//! end-4   4            file_checksum:u32   rolling crc
//! ```
//!
//! All integers are little-endian. The header pad word is written as zero and
//! accepted with any value on read. The file checksum is the fold
//! `C0 = 0; Ci = crc32(Ci-1 || data_crc_i)` over the per-batch CRCs in file
//! order (see [`rookery_types::chain_crc32`]).
//!
//! Batch bodies are version-dependent: V2/V3 use the native encoding in
//! [`batch`], V0/V1 carry a protobuf message decoded best-effort by
//! [`legacy`]. Writing always produces the native encoding.

pub mod batch;
pub mod entity;
pub mod error;
pub mod legacy;
pub mod reader;
pub mod set;
pub mod version;
pub mod writer;

pub use batch::{SnapshotBatchBody, SnapshotBatchType};
pub use error::{Result, SnapshotError};
pub use reader::SnapshotObjectReader;
pub use set::{SnapshotManifest, create_snapshot_set, load_snapshot_set, snapshot_set_name};
pub use version::SnapshotVersion;
pub use writer::SnapshotObjectWriter;

/// Magic bytes opening every snapshot object file.
pub const MAGIC_SNAPSHOT_HEAD: &[u8; 8] = b"SnapHead";

/// Magic bytes preceding the trailing file checksum.
pub const MAGIC_SNAPSHOT_TAIL: &[u8; 8] = b"SnapTail";

/// Size of the fixed batch header: `data_length:u32 || data_crc:u32 || pad:u32`.
pub const BATCH_HEADER_SIZE: u64 = 12;

/// Upper bound on a single batch body, rejected before allocation.
pub const MAX_BATCH_BODY_SIZE: u32 = 256 * 1024 * 1024;
