//! Snapshot object reader.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use snafu::ResultExt;
use tracing::debug;

use rookery_types::{chain_crc32, crc32};

use crate::batch::SnapshotBatchBody;
use crate::error::{IoSnafu, Result, SnapshotError};
use crate::legacy::parse_legacy_batch;
use crate::version::SnapshotVersion;
use crate::{MAGIC_SNAPSHOT_HEAD, MAGIC_SNAPSHOT_TAIL, MAX_BATCH_BODY_SIZE};

/// Streams batches out of one snapshot object file, verifying per-batch CRCs
/// and the whole-file rolling checksum.
pub struct SnapshotObjectReader {
    input: BufReader<File>,
    path: PathBuf,
    version: SnapshotVersion,
    checksum: u32,
    finished: bool,
}

impl SnapshotObjectReader {
    /// Opens the object file and validates the header magic and version.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::CorruptedHeader`] on unrecognized magic,
    /// [`SnapshotError::UnknownVersion`] on an unrecognized version byte,
    /// and [`SnapshotError::Truncated`] if the file is shorter than the
    /// header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).context(IoSnafu)?;
        let mut input = BufReader::new(file);

        let mut magic = [0u8; 8];
        read_exact_or_truncated(&mut input, &mut magic, "header magic")?;
        if &magic != MAGIC_SNAPSHOT_HEAD {
            return Err(SnapshotError::CorruptedHeader {
                reason: format!("expected SnapHead, got {magic:02x?}"),
            });
        }

        let mut version_byte = [0u8; 1];
        read_exact_or_truncated(&mut input, &mut version_byte, "version byte")?;
        let version = SnapshotVersion::from_disk(version_byte[0])
            .ok_or(SnapshotError::UnknownVersion { version: version_byte[0] })?;

        Ok(Self { input, path, version, checksum: 0, finished: false })
    }

    /// The version byte read from the header.
    pub fn version(&self) -> SnapshotVersion {
        self.version
    }

    /// Reads the next batch.
    ///
    /// Returns `Ok(None)` once the tail magic is reached and the trailing
    /// checksum matches the accumulated rolling checksum.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::ChecksumMismatch`] if a batch body fails its
    /// CRC or the trailing checksum disagrees, [`SnapshotError::Truncated`]
    /// on short reads, and [`SnapshotError::InvalidBatch`] if a body fails
    /// to parse.
    pub fn next_batch(&mut self) -> Result<Option<SnapshotBatchBody>> {
        if self.finished {
            return Ok(None);
        }

        let mut head = [0u8; 8];
        read_exact_or_truncated(&mut self.input, &mut head, "batch header")?;

        if &head == MAGIC_SNAPSHOT_TAIL {
            let mut trailing = [0u8; 4];
            read_exact_or_truncated(&mut self.input, &mut trailing, "file checksum")?;
            let expected = u32::from_le_bytes(trailing);
            if expected != self.checksum {
                return Err(SnapshotError::ChecksumMismatch {
                    expected,
                    actual: self.checksum,
                });
            }
            self.finished = true;
            debug!(path = %self.path.display(), "snapshot object fully read");
            return Ok(None);
        }

        let data_length = u32::from_le_bytes([head[0], head[1], head[2], head[3]]);
        let data_crc = u32::from_le_bytes([head[4], head[5], head[6], head[7]]);

        // Pad word: emitted zero, accepted with any value.
        let mut pad = [0u8; 4];
        read_exact_or_truncated(&mut self.input, &mut pad, "header pad")?;

        if data_length > MAX_BATCH_BODY_SIZE {
            return Err(SnapshotError::InvalidBatch {
                reason: format!("data_length {data_length} exceeds {MAX_BATCH_BODY_SIZE} limit"),
            });
        }

        let mut body = vec![0u8; data_length as usize];
        read_exact_or_truncated(&mut self.input, &mut body, "batch body")?;

        let actual = crc32(&body);
        if actual != data_crc {
            return Err(SnapshotError::ChecksumMismatch { expected: data_crc, actual });
        }
        self.checksum = chain_crc32(self.checksum, data_crc);

        let batch = if self.version.is_legacy() {
            parse_legacy_batch(&body)?
        } else {
            SnapshotBatchBody::parse(&body)?
        };
        Ok(Some(batch))
    }

    /// Reads all remaining batches, enforcing the trailing checksum.
    pub fn read_to_end(&mut self) -> Result<Vec<SnapshotBatchBody>> {
        let mut batches = Vec::new();
        while let Some(batch) = self.next_batch()? {
            batches.push(batch);
        }
        Ok(batches)
    }
}

/// Reads exactly `buf.len()` bytes, converting EOF to a `Truncated` error.
fn read_exact_or_truncated(
    reader: &mut impl Read,
    buf: &mut [u8],
    context: &'static str,
) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            SnapshotError::Truncated {
                reason: format!("unexpected EOF reading {context} ({} bytes)", buf.len()),
            }
        } else {
            SnapshotError::Io { source: e, location: snafu::Location::new(file!(), line!(), 0) }
        }
    })
}
