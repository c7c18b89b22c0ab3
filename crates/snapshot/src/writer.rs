//! Snapshot object writer.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use snafu::ResultExt;
use tracing::debug;

use rookery_types::{chain_crc32, crc32};

use crate::batch::SnapshotBatchBody;
use crate::error::{IoSnafu, Result, SnapshotError};
use crate::version::SnapshotVersion;
use crate::{BATCH_HEADER_SIZE, MAGIC_SNAPSHOT_HEAD, MAGIC_SNAPSHOT_TAIL};

/// Writes one snapshot object file: magic header, version byte, a stream of
/// batches, then the trailing magic and rolling checksum.
///
/// Each appended batch is flushed to the OS immediately; durability is only
/// guaranteed after [`finish`](Self::finish), which writes the tail and
/// fsyncs. Dropping the writer without finishing leaves a file with no tail,
/// which the reader rejects as truncated.
pub struct SnapshotObjectWriter {
    out: BufWriter<File>,
    path: PathBuf,
    checksum: u32,
    batches_written: u64,
}

impl SnapshotObjectWriter {
    /// Creates (truncate-or-create) the object file and writes the header.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::UnknownVersion`] for legacy or uninitialized
    /// versions — only native-format versions can be written — and
    /// [`SnapshotError::Io`] if the file cannot be created.
    pub fn open(path: impl AsRef<Path>, version: SnapshotVersion) -> Result<Self> {
        if version.is_legacy() || version == SnapshotVersion::None {
            return Err(SnapshotError::UnknownVersion { version: version.as_u8() });
        }

        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).context(IoSnafu)?;
        let mut out = BufWriter::new(file);
        out.write_all(MAGIC_SNAPSHOT_HEAD).context(IoSnafu)?;
        out.write_all(&[version.as_u8()]).context(IoSnafu)?;

        Ok(Self { out, path, checksum: 0, batches_written: 0 })
    }

    /// Serializes one batch, writes its header and body, and folds its CRC
    /// into the running file checksum.
    ///
    /// Returns the bytes written for this batch (header included) and the
    /// updated running checksum.
    pub fn append(&mut self, batch: &SnapshotBatchBody) -> Result<(u64, u32)> {
        let body = batch.serialize();
        let data_crc = crc32(&body);

        self.out.write_all(&(body.len() as u32).to_le_bytes()).context(IoSnafu)?;
        self.out.write_all(&data_crc.to_le_bytes()).context(IoSnafu)?;
        self.out.write_all(&0u32.to_le_bytes()).context(IoSnafu)?;
        self.out.write_all(&body).context(IoSnafu)?;
        self.out.flush().context(IoSnafu)?;

        self.checksum = chain_crc32(self.checksum, data_crc);
        self.batches_written += 1;

        Ok((BATCH_HEADER_SIZE + body.len() as u64, self.checksum))
    }

    /// The running file checksum after the last appended batch.
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    /// Batches appended so far.
    pub fn batches_written(&self) -> u64 {
        self.batches_written
    }

    /// Writes the tail magic and the rolling checksum, then fsyncs and
    /// closes the file.
    pub fn finish(mut self) -> Result<()> {
        self.out.write_all(MAGIC_SNAPSHOT_TAIL).context(IoSnafu)?;
        self.out.write_all(&self.checksum.to_le_bytes()).context(IoSnafu)?;
        self.out.flush().context(IoSnafu)?;
        self.out.get_ref().sync_all().context(IoSnafu)?;

        debug!(
            path = %self.path.display(),
            batches = self.batches_written,
            checksum = self.checksum,
            "finished snapshot object"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use crate::batch::SnapshotBatchType;

    use super::*;

    #[test]
    fn test_open_rejects_legacy_versions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obj.snap");
        for version in [SnapshotVersion::V0, SnapshotVersion::V1, SnapshotVersion::None] {
            let result = SnapshotObjectWriter::open(&path, version);
            assert!(matches!(result, Err(SnapshotError::UnknownVersion { .. })));
        }
    }

    #[test]
    fn test_append_reports_size_and_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obj.snap");
        let mut writer = SnapshotObjectWriter::open(&path, SnapshotVersion::V3).unwrap();

        let mut batch = SnapshotBatchBody::new(SnapshotBatchType::Session);
        batch.add(b"element".to_vec());
        let body_len = batch.serialize().len() as u64;

        let (written, checksum) = writer.append(&batch).unwrap();
        assert_eq!(written, BATCH_HEADER_SIZE + body_len);
        assert_eq!(checksum, writer.checksum());
        assert_eq!(writer.batches_written(), 1);
    }

    #[test]
    fn test_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obj.snap");
        let mut writer = SnapshotObjectWriter::open(&path, SnapshotVersion::V2).unwrap();
        let batch = SnapshotBatchBody::new(SnapshotBatchType::AclMap);
        writer.append(&batch).unwrap();
        let checksum = writer.checksum();
        writer.finish().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], MAGIC_SNAPSHOT_HEAD);
        assert_eq!(bytes[8], SnapshotVersion::V2.as_u8());
        assert_eq!(&bytes[bytes.len() - 12..bytes.len() - 4], MAGIC_SNAPSHOT_TAIL);
        assert_eq!(&bytes[bytes.len() - 4..], checksum.to_le_bytes());
        // Header pad word is written as zero.
        let body_len = batch.serialize().len();
        let pad_offset = 9 + 8;
        assert_eq!(&bytes[pad_offset..pad_offset + 4], &[0, 0, 0, 0]);
        assert_eq!(bytes.len(), 9 + 12 + body_len + 12);
    }
}
