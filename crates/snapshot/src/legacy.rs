//! Best-effort decoding of legacy V0/V1 protobuf batch bodies.
//!
//! Early snapshot versions wrapped batch elements in a protobuf message
//! instead of the native framing. Reading them is supported on a best-effort
//! basis so old snapshot sets remain loadable; writing always produces the
//! native encoding.

use prost::Message;

use crate::batch::{SnapshotBatchBody, SnapshotBatchType};
use crate::error::{Result, SnapshotError};

/// One opaque element inside a legacy batch.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SnapshotItemProto {
    /// Element bytes; interpretation depends on the batch type.
    #[prost(bytes = "vec", tag = "1")]
    pub data: Vec<u8>,
}

/// Legacy batch body message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SnapshotBatchProto {
    /// Entity category tag, same values as the native encoding.
    #[prost(int32, tag = "1")]
    pub batch_type: i32,
    /// Elements in insertion order.
    #[prost(message, repeated, tag = "2")]
    pub data: Vec<SnapshotItemProto>,
}

/// Decodes a legacy batch body into the native representation.
///
/// # Errors
///
/// Returns [`SnapshotError::InvalidBatch`] if the protobuf message fails to
/// decode or carries an unknown batch type.
pub fn parse_legacy_batch(body: &[u8]) -> Result<SnapshotBatchBody> {
    let proto = SnapshotBatchProto::decode(body)
        .map_err(|e| SnapshotError::InvalidBatch { reason: format!("legacy batch: {e}") })?;

    let batch_type = SnapshotBatchType::from_i32(proto.batch_type).ok_or_else(|| {
        SnapshotError::InvalidBatch {
            reason: format!("legacy batch: unknown batch type {}", proto.batch_type),
        }
    })?;

    Ok(SnapshotBatchBody {
        batch_type,
        elements: proto.data.into_iter().map(|item| item.data).collect(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_batch_decodes() {
        let proto = SnapshotBatchProto {
            batch_type: SnapshotBatchType::Session.as_i32(),
            data: vec![
                SnapshotItemProto { data: b"one".to_vec() },
                SnapshotItemProto { data: b"two".to_vec() },
            ],
        };
        let batch = parse_legacy_batch(&proto.encode_to_vec()).unwrap();
        assert_eq!(batch.batch_type, SnapshotBatchType::Session);
        assert_eq!(batch.elements, vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[test]
    fn test_legacy_unknown_type_rejected() {
        let proto = SnapshotBatchProto { batch_type: 77, data: vec![] };
        assert!(matches!(
            parse_legacy_batch(&proto.encode_to_vec()),
            Err(SnapshotError::InvalidBatch { .. })
        ));
    }

    #[test]
    fn test_legacy_garbage_rejected() {
        assert!(matches!(
            parse_legacy_batch(&[0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
            Err(SnapshotError::InvalidBatch { .. })
        ));
    }
}
