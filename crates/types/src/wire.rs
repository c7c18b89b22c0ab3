//! Little-endian wire encoding helpers shared with the client protocol.
//!
//! All multi-byte integers are little-endian; strings and byte blobs are
//! prefixed with an `i32` length. The `get_*` functions never panic: every
//! read is bounds-checked and truncation surfaces as [`WireError`].

use bytes::{Buf, BufMut};

use crate::error::WireError;

/// Writes a little-endian `i32`.
pub fn put_i32(buf: &mut impl BufMut, v: i32) {
    buf.put_i32_le(v);
}

/// Writes a little-endian `i64`.
pub fn put_i64(buf: &mut impl BufMut, v: i64) {
    buf.put_i64_le(v);
}

/// Writes a little-endian `u32`.
pub fn put_u32(buf: &mut impl BufMut, v: u32) {
    buf.put_u32_le(v);
}

/// Writes a little-endian `u64`.
pub fn put_u64(buf: &mut impl BufMut, v: u64) {
    buf.put_u64_le(v);
}

/// Writes an `i32`-length-prefixed string.
pub fn put_str(buf: &mut impl BufMut, s: &str) {
    put_i32(buf, s.len() as i32);
    buf.put_slice(s.as_bytes());
}

/// Writes an `i32`-length-prefixed byte blob.
pub fn put_blob(buf: &mut impl BufMut, data: &[u8]) {
    put_i32(buf, data.len() as i32);
    buf.put_slice(data);
}

fn ensure(buf: &impl Buf, needed: usize, context: &'static str) -> Result<(), WireError> {
    if buf.remaining() < needed {
        return Err(WireError::UnexpectedEnd { needed: needed - buf.remaining(), context });
    }
    Ok(())
}

/// Reads a little-endian `i32`.
pub fn get_i32(buf: &mut impl Buf, context: &'static str) -> Result<i32, WireError> {
    ensure(buf, 4, context)?;
    Ok(buf.get_i32_le())
}

/// Reads a little-endian `i64`.
pub fn get_i64(buf: &mut impl Buf, context: &'static str) -> Result<i64, WireError> {
    ensure(buf, 8, context)?;
    Ok(buf.get_i64_le())
}

/// Reads a little-endian `u32`.
pub fn get_u32(buf: &mut impl Buf, context: &'static str) -> Result<u32, WireError> {
    ensure(buf, 4, context)?;
    Ok(buf.get_u32_le())
}

/// Reads a little-endian `u64`.
pub fn get_u64(buf: &mut impl Buf, context: &'static str) -> Result<u64, WireError> {
    ensure(buf, 8, context)?;
    Ok(buf.get_u64_le())
}

/// Reads an `i32`-length-prefixed byte blob.
pub fn get_blob(buf: &mut impl Buf, context: &'static str) -> Result<Vec<u8>, WireError> {
    let len = get_i32(buf, context)?;
    if len < 0 {
        return Err(WireError::NegativeLength { length: len, context });
    }
    let len = len as usize;
    ensure(buf, len, context)?;
    let mut data = vec![0u8; len];
    buf.copy_to_slice(&mut data);
    Ok(data)
}

/// Reads an `i32`-length-prefixed UTF-8 string.
pub fn get_str(buf: &mut impl Buf, context: &'static str) -> Result<String, WireError> {
    let data = get_blob(buf, context)?;
    String::from_utf8(data).map_err(|_| WireError::InvalidUtf8 { context })
}
