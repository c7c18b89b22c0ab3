//! Entity serializers: store maps ⇄ snapshot object files.
//!
//! Each serializer takes the lock(s) guarding its entity for the duration of
//! the pass, batches elements every `save_batch_size`, and always flushes a
//! final batch so an empty entity still produces a well-formed object. The
//! one exception is the ephemerals index, which produces no object at all
//! when empty.
//!
//! Element encodings (all little-endian, strings `i32`-length-prefixed):
//! - ACL map: `id:u64 || acl_list`
//! - Session: `session_id:i64 || timeout_ms:i64 || auth_ids`
//! - Ephemerals: `session_id:i64 || path_count:u64 || path...`
//! - String map: `key || value` (both strings)
//! - Int map: `key || value:u64`

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use bytes::Buf;
use tracing::info;

use rookery_store::KeeperStore;
use rookery_types::{Acl, AuthId, acl, wire};

use crate::batch::{SnapshotBatchBody, SnapshotBatchType};
use crate::error::{Result, SnapshotError};
use crate::reader::SnapshotObjectReader;
use crate::version::SnapshotVersion;
use crate::writer::SnapshotObjectWriter;

/// Accumulates elements into batches of `save_batch_size` and appends each
/// full batch to the writer. `finish` flushes the last batch even when it is
/// empty, matching the on-disk convention that every object holds at least
/// one batch.
struct BatchAccumulator<'a> {
    writer: &'a mut SnapshotObjectWriter,
    batch: SnapshotBatchBody,
    batch_type: SnapshotBatchType,
    save_batch_size: u32,
}

impl<'a> BatchAccumulator<'a> {
    fn new(
        writer: &'a mut SnapshotObjectWriter,
        batch_type: SnapshotBatchType,
        save_batch_size: u32,
    ) -> Self {
        Self { writer, batch: SnapshotBatchBody::new(batch_type), batch_type, save_batch_size }
    }

    fn push(&mut self, element: Vec<u8>) -> Result<()> {
        if self.batch.len() as u32 == self.save_batch_size {
            self.writer.append(&self.batch)?;
            self.batch = SnapshotBatchBody::new(self.batch_type);
        }
        self.batch.add(element);
        Ok(())
    }

    fn finish(self) -> Result<()> {
        self.writer.append(&self.batch)?;
        Ok(())
    }
}

/// Verifies that a batch read back from `path` carries the expected type.
fn expect_batch_type(batch: &SnapshotBatchBody, expected: SnapshotBatchType) -> Result<()> {
    if batch.batch_type != expected {
        return Err(SnapshotError::InvalidBatch {
            reason: format!("expected {expected:?} batch, found {:?}", batch.batch_type),
        });
    }
    Ok(())
}

// ============================================================================
// ACL map
// ============================================================================

/// Serializes the ACL map into one snapshot object.
///
/// Holds the ACL lock for the whole pass.
pub fn serialize_acls(
    store: &KeeperStore,
    path: impl AsRef<Path>,
    save_batch_size: u32,
    version: SnapshotVersion,
) -> Result<()> {
    let mut writer = SnapshotObjectWriter::open(&path, version)?;
    let acl_map = store.acl_map.lock();
    info!(size = acl_map.len(), path = %path.as_ref().display(), "serializing acl map");

    let mut acc = BatchAccumulator::new(&mut writer, SnapshotBatchType::AclMap, save_batch_size);
    for (id, acls) in acl_map.mapping() {
        let mut element = Vec::new();
        wire::put_u64(&mut element, *id);
        acl::write_acl_list(&mut element, acls);
        acc.push(element)?;
    }
    acc.finish()?;
    drop(acl_map);
    writer.finish()
}

/// Reads an ACL object back into an `id → list` mapping.
pub fn deserialize_acls(path: impl AsRef<Path>) -> Result<HashMap<u64, Vec<Acl>>> {
    let mut reader = SnapshotObjectReader::open(&path)?;
    let mut mapping = HashMap::new();
    while let Some(batch) = reader.next_batch()? {
        expect_batch_type(&batch, SnapshotBatchType::AclMap)?;
        for element in &batch.elements {
            let mut rd = &element[..];
            let id = wire::get_u64(&mut rd, "acl id")
                .map_err(|e| SnapshotError::invalid_element("acl id", e))?;
            let acls = acl::read_acl_list(&mut rd)
                .map_err(|e| SnapshotError::invalid_element("acl list", e))?;
            mapping.insert(id, acls);
        }
    }
    Ok(mapping)
}

// ============================================================================
// Session table
// ============================================================================

/// Serializes the session table (with per-session auth) into one object.
///
/// Takes the session lock then the auth lock, holds both for the full pass,
/// and returns the `next_session_id` captured before iterating — recorded as
/// snapshot metadata so session allocation resumes correctly after a restore.
pub fn serialize_sessions(
    store: &KeeperStore,
    path: impl AsRef<Path>,
    save_batch_size: u32,
    version: SnapshotVersion,
) -> Result<i64> {
    let mut writer = SnapshotObjectWriter::open(&path, version)?;

    let sessions = store.sessions.lock();
    let auth = store.session_and_auth.lock();
    info!(
        size = sessions.session_and_timeout.len(),
        path = %path.as_ref().display(),
        "serializing session table"
    );

    let next_session_id = sessions.session_id_counter;

    let mut acc = BatchAccumulator::new(&mut writer, SnapshotBatchType::Session, save_batch_size);
    for (session_id, timeout_ms) in &sessions.session_and_timeout {
        let mut element = Vec::new();
        wire::put_i64(&mut element, *session_id);
        wire::put_i64(&mut element, *timeout_ms);
        let ids = auth.get(session_id).map(Vec::as_slice).unwrap_or(&[]);
        acl::write_auth_ids(&mut element, ids);
        acc.push(element)?;
    }
    acc.finish()?;
    drop(auth);
    drop(sessions);
    writer.finish()?;

    Ok(next_session_id)
}

/// Reads a session object back into timeout and auth maps.
///
/// Sessions with no auth identities get no auth entry, mirroring the store's
/// absent-means-empty convention.
#[allow(clippy::type_complexity)]
pub fn deserialize_sessions(
    path: impl AsRef<Path>,
) -> Result<(HashMap<i64, i64>, HashMap<i64, Vec<AuthId>>)> {
    let mut reader = SnapshotObjectReader::open(&path)?;
    let mut session_and_timeout = HashMap::new();
    let mut session_and_auth = HashMap::new();

    while let Some(batch) = reader.next_batch()? {
        expect_batch_type(&batch, SnapshotBatchType::Session)?;
        for element in &batch.elements {
            let mut rd = &element[..];
            let session_id = wire::get_i64(&mut rd, "session id")
                .map_err(|e| SnapshotError::invalid_element("session id", e))?;
            let timeout_ms = wire::get_i64(&mut rd, "session timeout")
                .map_err(|e| SnapshotError::invalid_element("session timeout", e))?;
            let ids = acl::read_auth_ids(&mut rd)
                .map_err(|e| SnapshotError::invalid_element("auth ids", e))?;

            session_and_timeout.insert(session_id, timeout_ms);
            if !ids.is_empty() {
                session_and_auth.insert(session_id, ids);
            }
        }
    }
    Ok((session_and_timeout, session_and_auth))
}

// ============================================================================
// Ephemerals index
// ============================================================================

/// Serializes the ephemerals index into one object.
///
/// Holds the ephemerals lock for the whole pass. An empty index produces no
/// object at all; the return value is 1 when an object was written, 0 when
/// not. Callers should only test it for zero.
pub fn serialize_ephemerals(
    store: &KeeperStore,
    path: impl AsRef<Path>,
    save_batch_size: u32,
    version: SnapshotVersion,
) -> Result<u64> {
    let ephemerals = store.ephemerals.lock();
    if ephemerals.is_empty() {
        info!("ephemerals index is empty, skipping object");
        return Ok(0);
    }
    info!(size = ephemerals.len(), path = %path.as_ref().display(), "serializing ephemerals");

    let mut writer = SnapshotObjectWriter::open(&path, version)?;
    let mut acc =
        BatchAccumulator::new(&mut writer, SnapshotBatchType::DataEphemeral, save_batch_size);
    for (session_id, paths) in ephemerals.iter() {
        let mut element = Vec::new();
        wire::put_i64(&mut element, *session_id);
        wire::put_u64(&mut element, paths.len() as u64);
        for node_path in paths {
            wire::put_str(&mut element, node_path);
        }
        acc.push(element)?;
    }
    acc.finish()?;
    drop(ephemerals);
    writer.finish()?;
    Ok(1)
}

/// Reads an ephemerals object back into a `session → paths` index.
pub fn deserialize_ephemerals(
    path: impl AsRef<Path>,
) -> Result<HashMap<i64, BTreeSet<String>>> {
    let mut reader = SnapshotObjectReader::open(&path)?;
    let mut index: HashMap<i64, BTreeSet<String>> = HashMap::new();

    while let Some(batch) = reader.next_batch()? {
        expect_batch_type(&batch, SnapshotBatchType::DataEphemeral)?;
        for element in &batch.elements {
            let mut rd = &element[..];
            let session_id = wire::get_i64(&mut rd, "ephemeral session id")
                .map_err(|e| SnapshotError::invalid_element("ephemeral session id", e))?;
            let path_count = wire::get_u64(&mut rd, "ephemeral path count")
                .map_err(|e| SnapshotError::invalid_element("ephemeral path count", e))?;

            let paths = index.entry(session_id).or_default();
            for _ in 0..path_count {
                if rd.remaining() == 0 {
                    return Err(SnapshotError::InvalidBatch {
                        reason: format!(
                            "ephemeral element for session {session_id} declared {path_count} paths, input ended early"
                        ),
                    });
                }
                let node_path = wire::get_str(&mut rd, "ephemeral path")
                    .map_err(|e| SnapshotError::invalid_element("ephemeral path", e))?;
                paths.insert(node_path);
            }
        }
    }
    Ok(index)
}

// ============================================================================
// Auxiliary string/int maps
// ============================================================================

/// Serializes the auxiliary string map into one object.
pub fn serialize_string_map(
    store: &KeeperStore,
    path: impl AsRef<Path>,
    save_batch_size: u32,
    version: SnapshotVersion,
) -> Result<()> {
    let mut writer = SnapshotObjectWriter::open(&path, version)?;
    let map = store.string_map.lock();
    info!(size = map.len(), path = %path.as_ref().display(), "serializing string map");

    let mut acc = BatchAccumulator::new(&mut writer, SnapshotBatchType::StringMap, save_batch_size);
    for (key, value) in map.iter() {
        let mut element = Vec::new();
        wire::put_str(&mut element, key);
        wire::put_str(&mut element, value);
        acc.push(element)?;
    }
    acc.finish()?;
    drop(map);
    writer.finish()
}

/// Reads a string-map object back.
pub fn deserialize_string_map(path: impl AsRef<Path>) -> Result<HashMap<String, String>> {
    let mut reader = SnapshotObjectReader::open(&path)?;
    let mut map = HashMap::new();
    while let Some(batch) = reader.next_batch()? {
        expect_batch_type(&batch, SnapshotBatchType::StringMap)?;
        for element in &batch.elements {
            let mut rd = &element[..];
            let key = wire::get_str(&mut rd, "string map key")
                .map_err(|e| SnapshotError::invalid_element("string map key", e))?;
            let value = wire::get_str(&mut rd, "string map value")
                .map_err(|e| SnapshotError::invalid_element("string map value", e))?;
            map.insert(key, value);
        }
    }
    Ok(map)
}

/// Serializes the auxiliary int map into one object.
pub fn serialize_int_map(
    store: &KeeperStore,
    path: impl AsRef<Path>,
    save_batch_size: u32,
    version: SnapshotVersion,
) -> Result<()> {
    let mut writer = SnapshotObjectWriter::open(&path, version)?;
    let map = store.int_map.lock();
    info!(size = map.len(), path = %path.as_ref().display(), "serializing int map");

    let mut acc = BatchAccumulator::new(&mut writer, SnapshotBatchType::UintMap, save_batch_size);
    for (key, value) in map.iter() {
        let mut element = Vec::new();
        wire::put_str(&mut element, key);
        wire::put_u64(&mut element, *value);
        acc.push(element)?;
    }
    acc.finish()?;
    drop(map);
    writer.finish()
}

/// Reads an int-map object back.
pub fn deserialize_int_map(path: impl AsRef<Path>) -> Result<HashMap<String, u64>> {
    let mut reader = SnapshotObjectReader::open(&path)?;
    let mut map = HashMap::new();
    while let Some(batch) = reader.next_batch()? {
        expect_batch_type(&batch, SnapshotBatchType::UintMap)?;
        for element in &batch.elements {
            let mut rd = &element[..];
            let key = wire::get_str(&mut rd, "int map key")
                .map_err(|e| SnapshotError::invalid_element("int map key", e))?;
            let value = wire::get_u64(&mut rd, "int map value")
                .map_err(|e| SnapshotError::invalid_element("int map value", e))?;
            map.insert(key, value);
        }
    }
    Ok(map)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use rookery_types::AuthId;

    use super::*;

    const BATCH: u32 = 3;
    const V: SnapshotVersion = SnapshotVersion::V3;

    #[test]
    fn test_acl_map_round_trip() {
        let store = KeeperStore::new();
        {
            let mut acls = store.acl_map.lock();
            acls.intern(vec![Acl::world_all()]);
            acls.intern(vec![Acl {
                permissions: 3,
                scheme: "digest".to_string(),
                id: "u:h".to_string(),
            }]);
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acls.snap");

        serialize_acls(&store, &path, BATCH, V).unwrap();
        let mapping = deserialize_acls(&path).unwrap();
        assert_eq!(&mapping, store.acl_map.lock().mapping());
    }

    #[test]
    fn test_session_round_trip_returns_counter() {
        let store = KeeperStore::new();
        let s1 = store.create_session(15_000);
        let s2 = store.create_session(30_000);
        store.add_auth(s1, AuthId { scheme: "digest".to_string(), id: "alice:x".to_string() });

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.snap");

        let next = serialize_sessions(&store, &path, BATCH, V).unwrap();
        assert_eq!(next, s2);

        let (timeouts, auth) = deserialize_sessions(&path).unwrap();
        assert_eq!(timeouts, store.sessions.lock().session_and_timeout);
        assert_eq!(auth.len(), 1);
        assert_eq!(auth.get(&s1).unwrap()[0].id, "alice:x");
    }

    #[test]
    fn test_empty_session_table_produces_valid_object() {
        let store = KeeperStore::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.snap");

        serialize_sessions(&store, &path, BATCH, V).unwrap();
        let (timeouts, auth) = deserialize_sessions(&path).unwrap();
        assert!(timeouts.is_empty());
        assert!(auth.is_empty());
    }

    #[test]
    fn test_empty_ephemerals_produce_no_object() {
        let store = KeeperStore::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ephemerals.snap");

        assert_eq!(serialize_ephemerals(&store, &path, BATCH, V).unwrap(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn test_ephemerals_round_trip() {
        let store = KeeperStore::new();
        {
            let mut ephemerals = store.ephemerals.lock();
            ephemerals
                .entry(7)
                .or_default()
                .extend(["/locks/a".to_string(), "/locks/b".to_string()]);
            ephemerals.entry(9).or_default().insert("/leader".to_string());
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ephemerals.snap");

        assert_eq!(serialize_ephemerals(&store, &path, BATCH, V).unwrap(), 1);
        let index = deserialize_ephemerals(&path).unwrap();
        assert_eq!(&index, &*store.ephemerals.lock());
    }

    #[test]
    fn test_string_and_int_map_round_trip() {
        let store = KeeperStore::new();
        store.string_map.lock().insert("cluster_name".to_string(), "rookery".to_string());
        store.int_map.lock().insert("applied_index".to_string(), 12_345);

        let dir = tempfile::tempdir().unwrap();
        let strings = dir.path().join("strings.snap");
        let ints = dir.path().join("ints.snap");

        serialize_string_map(&store, &strings, BATCH, V).unwrap();
        serialize_int_map(&store, &ints, BATCH, V).unwrap();

        assert_eq!(&deserialize_string_map(&strings).unwrap(), &*store.string_map.lock());
        assert_eq!(&deserialize_int_map(&ints).unwrap(), &*store.int_map.lock());
    }

    #[test]
    fn test_batch_size_one_and_full_collection() {
        let store = KeeperStore::new();
        for i in 0..10 {
            store.int_map.lock().insert(format!("key_{i}"), i);
        }
        let dir = tempfile::tempdir().unwrap();

        for (name, batch_size) in [("one.snap", 1u32), ("all.snap", 10u32)] {
            let path = dir.path().join(name);
            serialize_int_map(&store, &path, batch_size, V).unwrap();
            assert_eq!(&deserialize_int_map(&path).unwrap(), &*store.int_map.lock());
        }
    }

    #[test]
    fn test_mismatched_object_type_rejected() {
        let store = KeeperStore::new();
        store.string_map.lock().insert("k".to_string(), "v".to_string());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strings.snap");
        serialize_string_map(&store, &path, BATCH, V).unwrap();

        // Reading it as a session object must fail cleanly.
        assert!(matches!(
            deserialize_sessions(&path),
            Err(SnapshotError::InvalidBatch { .. })
        ));
    }
}
