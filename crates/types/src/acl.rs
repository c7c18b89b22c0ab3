//! ACL and auth identity types with their wire encodings.
//!
//! The encodings here are the same ones the client protocol uses, so ACL
//! lists stored in snapshots stay byte-compatible with what travels on the
//! wire: a `count: i32` followed by the entries, strings length-prefixed
//! with `i32`.

use bytes::{Buf, BufMut};

use crate::error::WireError;
use crate::wire;

/// Permission bit: read.
pub const PERM_READ: i32 = 1;
/// Permission bit: write.
pub const PERM_WRITE: i32 = 1 << 1;
/// Permission bit: create children.
pub const PERM_CREATE: i32 = 1 << 2;
/// Permission bit: delete children.
pub const PERM_DELETE: i32 = 1 << 3;
/// Permission bit: set ACLs.
pub const PERM_ADMIN: i32 = 1 << 4;
/// All permission bits.
pub const PERM_ALL: i32 = PERM_READ | PERM_WRITE | PERM_CREATE | PERM_DELETE | PERM_ADMIN;

/// A single access-control entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Acl {
    /// Bitmask of `PERM_*` flags.
    pub permissions: i32,
    /// Auth scheme, e.g. `"world"`, `"digest"`, `"ip"`.
    pub scheme: String,
    /// Scheme-specific identity, e.g. `"anyone"`.
    pub id: String,
}

impl Acl {
    /// The open-to-everyone ACL (`world:anyone` with all permissions).
    pub fn world_all() -> Self {
        Self { permissions: PERM_ALL, scheme: "world".to_string(), id: "anyone".to_string() }
    }

    /// Encodes one ACL entry.
    pub fn write(&self, buf: &mut impl BufMut) {
        wire::put_i32(buf, self.permissions);
        wire::put_str(buf, &self.scheme);
        wire::put_str(buf, &self.id);
    }

    /// Decodes one ACL entry.
    pub fn read(buf: &mut impl Buf) -> Result<Self, WireError> {
        let permissions = wire::get_i32(buf, "acl permissions")?;
        let scheme = wire::get_str(buf, "acl scheme")?;
        let id = wire::get_str(buf, "acl id")?;
        Ok(Self { permissions, scheme, id })
    }
}

/// Encodes an ACL list: `count: i32` then each entry.
pub fn write_acl_list(buf: &mut impl BufMut, acls: &[Acl]) {
    wire::put_i32(buf, acls.len() as i32);
    for acl in acls {
        acl.write(buf);
    }
}

/// Decodes an ACL list.
pub fn read_acl_list(buf: &mut impl Buf) -> Result<Vec<Acl>, WireError> {
    let count = wire::get_i32(buf, "acl count")?;
    if count < 0 {
        return Err(WireError::NegativeLength { length: count, context: "acl count" });
    }
    let mut acls = Vec::with_capacity(count.min(1024) as usize);
    for _ in 0..count {
        acls.push(Acl::read(buf)?);
    }
    Ok(acls)
}

/// An authenticated identity attached to a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthId {
    /// Auth scheme.
    pub scheme: String,
    /// Scheme-specific identity.
    pub id: String,
}

impl AuthId {
    /// Encodes one auth identity.
    pub fn write(&self, buf: &mut impl BufMut) {
        wire::put_str(buf, &self.scheme);
        wire::put_str(buf, &self.id);
    }

    /// Decodes one auth identity.
    pub fn read(buf: &mut impl Buf) -> Result<Self, WireError> {
        let scheme = wire::get_str(buf, "auth scheme")?;
        let id = wire::get_str(buf, "auth id")?;
        Ok(Self { scheme, id })
    }
}

/// Encodes an auth identity list: `count: i32` then each `{scheme, id}` pair.
pub fn write_auth_ids(buf: &mut impl BufMut, ids: &[AuthId]) {
    wire::put_i32(buf, ids.len() as i32);
    for id in ids {
        id.write(buf);
    }
}

/// Decodes an auth identity list.
pub fn read_auth_ids(buf: &mut impl Buf) -> Result<Vec<AuthId>, WireError> {
    let count = wire::get_i32(buf, "auth count")?;
    if count < 0 {
        return Err(WireError::NegativeLength { length: count, context: "auth count" });
    }
    let mut ids = Vec::with_capacity(count.min(1024) as usize);
    for _ in 0..count {
        ids.push(AuthId::read(buf)?);
    }
    Ok(ids)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_acl_list_round_trip() {
        let acls = vec![
            Acl::world_all(),
            Acl {
                permissions: PERM_READ | PERM_WRITE,
                scheme: "digest".to_string(),
                id: "alice:hash".to_string(),
            },
        ];
        let mut buf = Vec::new();
        write_acl_list(&mut buf, &acls);

        let mut rd = &buf[..];
        assert_eq!(read_acl_list(&mut rd).unwrap(), acls);
        assert_eq!(rd.remaining(), 0);
    }

    #[test]
    fn test_empty_acl_list_round_trip() {
        let mut buf = Vec::new();
        write_acl_list(&mut buf, &[]);
        assert_eq!(buf, 0i32.to_le_bytes());

        let mut rd = &buf[..];
        assert!(read_acl_list(&mut rd).unwrap().is_empty());
    }

    #[test]
    fn test_auth_ids_round_trip() {
        let ids = vec![AuthId { scheme: "digest".to_string(), id: "bob:secret".to_string() }];
        let mut buf = Vec::new();
        write_auth_ids(&mut buf, &ids);

        let mut rd = &buf[..];
        assert_eq!(read_auth_ids(&mut rd).unwrap(), ids);
    }

    #[test]
    fn test_truncated_acl_list_fails() {
        let mut buf = Vec::new();
        write_acl_list(&mut buf, &[Acl::world_all()]);
        buf.truncate(buf.len() - 3);

        let mut rd = &buf[..];
        assert!(read_acl_list(&mut rd).is_err());
    }
}
