//! CRC-32 checksum primitive and the rolling combiner for snapshot files.
//!
//! The snapshot object format carries two integrity layers: each batch body is
//! covered by a plain CRC-32 (zlib polynomial), and the whole file carries a
//! rolling checksum that folds the per-batch CRCs together in file order.
//!
//! The fold is deliberately *not* `crc32_combine`: it lays the previous
//! checksum and the new batch CRC side by side as an 8-byte little-endian
//! buffer and takes the CRC-32 of that buffer. This must be preserved
//! bit-exactly for on-disk compatibility with existing snapshot sets.

/// Computes the CRC-32 (zlib polynomial) of `data`.
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Folds a new batch CRC into the rolling file checksum.
///
/// Layout of the hashed buffer: `prev` in bytes 0..4, `next` in bytes 4..8,
/// both little-endian. The result depends on batch order, so two files with
/// the same batches in different order have different trailing checksums.
pub fn chain_crc32(prev: u32, next: u32) -> u32 {
    let mut buf = [0u8; 8];
    buf[..4].copy_from_slice(&prev.to_le_bytes());
    buf[4..].copy_from_slice(&next.to_le_bytes());
    crc32fast::hash(&buf)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_known_value() {
        // zlib polynomial: crc32(b"123456789") == 0xCBF43926
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_crc32_empty() {
        assert_eq!(crc32(b""), 0);
    }

    #[test]
    fn test_chain_is_crc_of_concatenated_words() {
        let prev = 0xDEAD_BEEFu32;
        let next = 0x1234_5678u32;
        let mut buf = Vec::new();
        buf.extend_from_slice(&prev.to_le_bytes());
        buf.extend_from_slice(&next.to_le_bytes());
        assert_eq!(chain_crc32(prev, next), crc32(&buf));
    }

    #[test]
    fn test_chain_depends_on_order() {
        let a = crc32(b"first batch");
        let b = crc32(b"second batch");
        let forward = chain_crc32(chain_crc32(0, a), b);
        let backward = chain_crc32(chain_crc32(0, b), a);
        assert_ne!(forward, backward);
    }

    #[test]
    fn test_fold_matches_manual_fold() {
        let crcs = [crc32(b"a"), crc32(b"bb"), crc32(b"ccc")];
        let folded = crcs.iter().fold(0u32, |acc, c| chain_crc32(acc, *c));
        let mut expected = 0u32;
        for c in crcs {
            expected = chain_crc32(expected, c);
        }
        assert_eq!(folded, expected);
    }
}
