//! Snapshot format versions.

use std::fmt;

/// On-disk snapshot format version.
///
/// The version is the single byte following the header magic. V0 and V1
/// carry protobuf batch bodies; V2 and V3 carry the native encoding. `None`
/// (0xFF) marks an uninitialized version and is invalid on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SnapshotVersion {
    /// Legacy protobuf batch bodies.
    V0 = 0,
    /// Legacy protobuf batch bodies.
    V1 = 1,
    /// Native batch bodies.
    V2 = 2,
    /// Native batch bodies; header pad word reserved for forward use.
    V3 = 3,
    /// Uninitialized; never written to disk.
    None = 0xFF,
}

/// The version new snapshots are written with.
pub const CURRENT_SNAPSHOT_VERSION: SnapshotVersion = SnapshotVersion::V3;

impl SnapshotVersion {
    /// Parses an on-disk version byte. 0xFF is rejected.
    pub fn from_disk(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::V0),
            1 => Some(Self::V1),
            2 => Some(Self::V2),
            3 => Some(Self::V3),
            _ => None,
        }
    }

    /// The on-disk byte for this version.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether batch bodies use the legacy protobuf encoding.
    pub fn is_legacy(self) -> bool {
        matches!(self, Self::V0 | Self::V1)
    }
}

impl fmt::Display for SnapshotVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V0 => write!(f, "v0"),
            Self::V1 => write!(f, "v1"),
            Self::V2 => write!(f, "v2"),
            Self::V3 => write!(f, "v3"),
            Self::None => write!(f, "none"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disk_round_trip() {
        for version in [
            SnapshotVersion::V0,
            SnapshotVersion::V1,
            SnapshotVersion::V2,
            SnapshotVersion::V3,
        ] {
            assert_eq!(SnapshotVersion::from_disk(version.as_u8()), Some(version));
        }
    }

    #[test]
    fn test_invalid_bytes_rejected() {
        assert_eq!(SnapshotVersion::from_disk(4), None);
        assert_eq!(SnapshotVersion::from_disk(0xFF), None);
    }

    #[test]
    fn test_legacy_split() {
        assert!(SnapshotVersion::V0.is_legacy());
        assert!(SnapshotVersion::V1.is_legacy());
        assert!(!SnapshotVersion::V2.is_legacy());
        assert!(!SnapshotVersion::V3.is_legacy());
    }
}
