//! Postcard encode/decode helpers with snafu error handling.
//!
//! Used for small out-of-band structures (the snapshot-set manifest); the
//! snapshot object format itself is hand-encoded in the snapshot crate.

use serde::{Serialize, de::DeserializeOwned};
use snafu::Snafu;

/// Error type for codec operations.
#[derive(Debug, Snafu)]
pub enum CodecError {
    /// Encoding failed.
    #[snafu(display("Encoding failed: {source}"))]
    Encode {
        /// The underlying postcard error.
        source: postcard::Error,
    },

    /// Decoding failed.
    #[snafu(display("Decoding failed: {source}"))]
    Decode {
        /// The underlying postcard error.
        source: postcard::Error,
    },
}

/// Encodes a value to bytes.
///
/// # Errors
///
/// Returns `CodecError::Encode` if serialization fails.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(value).map_err(|source| CodecError::Encode { source })
}

/// Decodes a value from bytes.
///
/// # Errors
///
/// Returns `CodecError::Decode` if deserialization fails.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    postcard::from_bytes(bytes).map_err(|source| CodecError::Decode { source })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Manifest {
        version: u8,
        next_session_id: i64,
        objects: Vec<String>,
    }

    #[test]
    fn test_round_trip() {
        let original = Manifest {
            version: 3,
            next_session_id: 1024,
            objects: vec!["sessions.snap".to_string(), "acls.snap".to_string()],
        };
        let bytes = encode(&original).expect("encode");
        let decoded: Manifest = decode(&bytes).expect("decode");
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_decode_truncated_fails() {
        let original = Manifest { version: 3, next_session_id: 7, objects: vec![] };
        let bytes = encode(&original).expect("encode");
        let result: Result<Manifest, _> = decode(&bytes[..bytes.len() - 1]);
        assert!(matches!(result, Err(CodecError::Decode { .. })));
    }

    #[test]
    fn test_decode_empty_fails() {
        let result: Result<Manifest, _> = decode(&[]);
        assert!(result.is_err());
    }
}
