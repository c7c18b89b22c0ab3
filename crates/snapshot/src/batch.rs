//! Native batch body codec (format versions V2/V3).
//!
//! A batch is a typed group of opaque byte elements written as one unit:
//! `type:i32 || element_count:i32 || (len:i32, bytes) x element_count`.
//! The element list preserves insertion order. CRC validation is the object
//! reader's job; this codec only frames and unframes bytes.

use bytes::Buf;

use rookery_types::wire;

use crate::error::{Result, SnapshotError};

/// Entity category carried by a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum SnapshotBatchType {
    /// Session table entries.
    Session = 1,
    /// ACL map entries.
    AclMap = 2,
    /// Auxiliary string map entries.
    StringMap = 3,
    /// Auxiliary int map entries.
    UintMap = 4,
    /// Ephemerals index entries.
    DataEphemeral = 5,
    /// Data tree nodes (serialized by the tree layer).
    DataTree = 6,
}

impl SnapshotBatchType {
    /// Parses the on-disk type tag.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Session),
            2 => Some(Self::AclMap),
            3 => Some(Self::StringMap),
            4 => Some(Self::UintMap),
            5 => Some(Self::DataEphemeral),
            6 => Some(Self::DataTree),
            _ => None,
        }
    }

    /// The on-disk type tag.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// A typed batch of opaque byte elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotBatchBody {
    /// Entity category of every element in this batch.
    pub batch_type: SnapshotBatchType,
    /// Opaque elements in insertion order.
    pub elements: Vec<Vec<u8>>,
}

impl SnapshotBatchBody {
    /// Creates an empty batch of the given type.
    pub fn new(batch_type: SnapshotBatchType) -> Self {
        Self { batch_type, elements: Vec::new() }
    }

    /// Appends an element.
    pub fn add(&mut self, element: Vec<u8>) {
        self.elements.push(element);
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the batch holds no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Encodes the batch body.
    pub fn serialize(&self) -> Vec<u8> {
        let payload: usize = self.elements.iter().map(|e| e.len() + 4).sum();
        let mut buf = Vec::with_capacity(8 + payload);
        wire::put_i32(&mut buf, self.batch_type.as_i32());
        wire::put_i32(&mut buf, self.elements.len() as i32);
        for element in &self.elements {
            wire::put_blob(&mut buf, element);
        }
        buf
    }

    /// Decodes a batch body.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::InvalidBatch`] if the type tag is unknown,
    /// the element count is negative, or any element length runs past the
    /// end of the input. Trailing bytes after the declared elements are
    /// ignored.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut rd = data;

        let type_tag = wire::get_i32(&mut rd, "batch type")
            .map_err(|e| SnapshotError::invalid_element("batch type", e))?;
        let batch_type = SnapshotBatchType::from_i32(type_tag)
            .ok_or(SnapshotError::InvalidBatch { reason: format!("unknown batch type {type_tag}") })?;

        let element_count = wire::get_i32(&mut rd, "element count")
            .map_err(|e| SnapshotError::invalid_element("element count", e))?;
        if element_count < 0 {
            return Err(SnapshotError::InvalidBatch {
                reason: format!("negative element count {element_count}"),
            });
        }

        let mut elements = Vec::with_capacity(element_count.min(4096) as usize);
        for index in 0..element_count {
            if rd.remaining() == 0 {
                return Err(SnapshotError::InvalidBatch {
                    reason: format!("declared {element_count} elements, input ended at {index}"),
                });
            }
            let element = wire::get_blob(&mut rd, "batch element")
                .map_err(|e| SnapshotError::invalid_element("batch element", e))?;
            elements.push(element);
        }

        Ok(Self { batch_type, elements })
    }
}
