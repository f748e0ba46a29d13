//! Stateless little-endian integer reads at fixed offsets.
//!
//! Header parsers read whole headers up front and then pick fields out by
//! offset; every read is bounds-checked and yields `None` past the end.

#[inline]
pub(crate) fn u16_le(buf: &[u8], offset: usize) -> Option<u16> {
    let b = buf.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([b[0], b[1]]))
}

#[inline]
pub(crate) fn u32_le(buf: &[u8], offset: usize) -> Option<u32> {
    let b = buf.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

#[inline]
pub(crate) fn i32_le(buf: &[u8], offset: usize) -> Option<i32> {
    u32_le(buf, offset).map(|v| v as i32)
}
