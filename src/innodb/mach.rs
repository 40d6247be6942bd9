//! Bounds-checked big-endian field readers.
//!
//! InnoDB stores every multi-byte integer big-endian regardless of the host.
//! These helpers read one field at `offset` within `buf` and return `None`
//! when the field would extend past the end of the slice, so decoders built
//! on them never panic on truncated or malformed pages.

use byteorder::{BigEndian, ByteOrder};

/// Borrow `len` bytes at `offset`, or `None` if out of range.
#[inline]
pub fn field(buf: &[u8], offset: usize, len: usize) -> Option<&[u8]> {
    let end = offset.checked_add(len)?;
    buf.get(offset..end)
}

#[inline]
pub fn read_u8(buf: &[u8], offset: usize) -> Option<u8> {
    buf.get(offset).copied()
}

#[inline]
pub fn read_u16(buf: &[u8], offset: usize) -> Option<u16> {
    field(buf, offset, 2).map(BigEndian::read_u16)
}

#[inline]
pub fn read_u32(buf: &[u8], offset: usize) -> Option<u32> {
    field(buf, offset, 4).map(BigEndian::read_u32)
}

#[inline]
pub fn read_i32(buf: &[u8], offset: usize) -> Option<i32> {
    field(buf, offset, 4).map(BigEndian::read_i32)
}

#[inline]
pub fn read_u64(buf: &[u8], offset: usize) -> Option<u64> {
    field(buf, offset, 8).map(BigEndian::read_u64)
}
