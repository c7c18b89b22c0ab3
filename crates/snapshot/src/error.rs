//! Snapshot engine errors.

use snafu::{Location, Snafu};

/// Result type for snapshot operations.
pub type Result<T, E = SnapshotError> = std::result::Result<T, E>;

/// Errors that can occur while writing or reading snapshot objects.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SnapshotError {
    /// I/O error during snapshot read/write.
    #[snafu(display("Snapshot I/O error: {source}"))]
    Io {
        /// Underlying I/O error.
        source: std::io::Error,
        /// Source location.
        #[snafu(implicit)]
        location: Location,
    },

    /// The file does not start with the snapshot magic.
    #[snafu(display("Corrupted snapshot header: {reason}"))]
    CorruptedHeader {
        /// What was found instead.
        reason: String,
    },

    /// The version byte is not a recognized on-disk version.
    #[snafu(display("Unknown snapshot version byte 0x{version:02x}"))]
    UnknownVersion {
        /// The raw version byte.
        version: u8,
    },

    /// A per-batch or whole-file CRC comparison failed.
    #[snafu(display("Snapshot checksum mismatch: expected {expected:#010x}, got {actual:#010x}"))]
    ChecksumMismatch {
        /// Checksum recorded in the file.
        expected: u32,
        /// Checksum recomputed from the data.
        actual: u32,
    },

    /// The file ended before an expected structure could be read in full.
    #[snafu(display("Snapshot file truncated: {reason}"))]
    Truncated {
        /// What was being read.
        reason: String,
    },

    /// A batch body failed to parse.
    #[snafu(display("Invalid snapshot batch: {reason}"))]
    InvalidBatch {
        /// Why the body was rejected.
        reason: String,
    },

    /// Objects in one snapshot set carry different version bytes.
    #[snafu(display("Snapshot set version mismatch: manifest says v{expected}, object has v{found}"))]
    VersionMismatch {
        /// Version recorded in the set manifest.
        expected: u8,
        /// Version found in the object file.
        found: u8,
    },

    /// The set manifest failed to decode.
    #[snafu(display("Snapshot manifest error: {source}"))]
    Manifest {
        /// Underlying codec error.
        source: rookery_types::codec::CodecError,
    },
}

impl SnapshotError {
    /// Maps a wire decoding failure inside a batch element to `InvalidBatch`.
    pub(crate) fn invalid_element(what: &str, err: rookery_types::WireError) -> Self {
        SnapshotError::InvalidBatch { reason: format!("{what}: {err}") }
    }
}
