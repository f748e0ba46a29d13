//! Growable input buffer shared by the streaming decoders.
//!
//! Bytes are appended with [`SourceBuffer::push`] as they arrive and are
//! never discarded, so decoders can address earlier data (GIF color maps,
//! LZW blocks) by absolute position. Reads never block: a request past the
//! end yields `None` and the caller reports incomplete input.

use alloc::vec::Vec;

use crate::error::CodecError;

#[derive(Clone, Debug, Default)]
pub(crate) struct SourceBuffer {
    data: Vec<u8>,
}

impl SourceBuffer {
    pub(crate) fn new(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
        }
    }

    pub(crate) fn push(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// `len` bytes starting at `pos`, if all of them have arrived.
    pub(crate) fn get(&self, pos: usize, len: usize) -> Option<&[u8]> {
        self.data.get(pos..pos.checked_add(len)?)
    }
}

/// Sequential reader over a [`SourceBuffer`], used by header parsers.
///
/// Header reads are all-or-nothing: a short read is reported as invalid
/// input, because a header that does not fit in the data seen so far
/// cannot select a pixel decoder.
pub(crate) struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn read_bytes(&mut self, n: usize, what: &str) -> Result<&'a [u8], CodecError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| CodecError::invalid(alloc::format!("unable to read {what}")))?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub(crate) fn read_u32_le(&mut self, what: &str) -> Result<u32, CodecError> {
        let b = self.read_bytes(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_extends_visible_range() {
        let mut src = SourceBuffer::new(&[1, 2, 3]);
        assert_eq!(src.get(1, 2), Some(&[2, 3][..]));
        assert_eq!(src.get(2, 2), None);
        src.push(&[4]);
        assert_eq!(src.get(2, 2), Some(&[3, 4][..]));
        assert_eq!(src.len(), 4);
        assert_eq!(src.get(4, 0), Some(&[][..]));
    }

    #[test]
    fn cursor_short_read_is_invalid() {
        let data = [1, 0, 0, 0, 9];
        let mut c = Cursor::new(&data);
        assert_eq!(c.read_u32_le("size").unwrap(), 1);
        assert_eq!(c.position(), 4);
        assert!(matches!(
            c.read_u32_le("size"),
            Err(CodecError::InvalidInput(_))
        ));
    }
}
