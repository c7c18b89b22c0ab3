//! Interned ACL lists.
//!
//! Nodes do not carry their ACL lists inline; identical lists are interned
//! once and nodes reference them by a dense `u64` id. The map is what the
//! snapshot ACL serializer walks, so it must round-trip exactly: ids are
//! never reused and id 0 is reserved for "no ACL".

use std::collections::HashMap;

use rookery_types::Acl;

/// Id assigned to the empty ACL list.
pub const EMPTY_ACL_ID: u64 = 0;

/// Bidirectional ACL interner: `id → list` with reverse lookup for interning.
#[derive(Debug, Default)]
pub struct AclMap {
    id_to_acls: HashMap<u64, Vec<Acl>>,
    acls_to_id: HashMap<Vec<Acl>, u64>,
    next_id: u64,
}

impl AclMap {
    /// Creates an empty map. Id 0 maps to the empty list.
    pub fn new() -> Self {
        let mut map = Self { id_to_acls: HashMap::new(), acls_to_id: HashMap::new(), next_id: 1 };
        map.id_to_acls.insert(EMPTY_ACL_ID, Vec::new());
        map.acls_to_id.insert(Vec::new(), EMPTY_ACL_ID);
        map
    }

    /// Interns an ACL list, returning its id. Identical lists share one id.
    pub fn intern(&mut self, acls: Vec<Acl>) -> u64 {
        if let Some(id) = self.acls_to_id.get(&acls) {
            return *id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.acls_to_id.insert(acls.clone(), id);
        self.id_to_acls.insert(id, acls);
        id
    }

    /// Looks up the list for an id.
    pub fn get(&self, id: u64) -> Option<&Vec<Acl>> {
        self.id_to_acls.get(&id)
    }

    /// The id → list mapping, as walked by the snapshot serializer.
    pub fn mapping(&self) -> &HashMap<u64, Vec<Acl>> {
        &self.id_to_acls
    }

    /// Number of interned lists (including the reserved empty list).
    pub fn len(&self) -> usize {
        self.id_to_acls.len()
    }

    /// Whether only the reserved empty list is present.
    pub fn is_empty(&self) -> bool {
        self.id_to_acls.len() <= 1
    }

    /// Rebuilds the map from a deserialized `id → list` mapping.
    ///
    /// The next id resumes after the largest restored id so later interns
    /// never collide with snapshotted ids.
    pub fn restore(mapping: HashMap<u64, Vec<Acl>>) -> Self {
        let next_id = mapping.keys().max().map_or(1, |max| max + 1);
        let acls_to_id = mapping.iter().map(|(id, acls)| (acls.clone(), *id)).collect();
        let mut map = Self { id_to_acls: mapping, acls_to_id, next_id };
        // The reserved empty entry survives restores even from snapshots
        // taken before it existed.
        map.id_to_acls.entry(EMPTY_ACL_ID).or_default();
        map.acls_to_id.entry(Vec::new()).or_insert(EMPTY_ACL_ID);
        map
    }
}
