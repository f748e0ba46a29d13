//! LZW decompression of GIF image data.
//!
//! The decoder is fed one data sub-block at a time and hands every completed
//! row to a [`RowSink`]. Its state survives between blocks, so a frame whose
//! data arrives in pieces is decoded as the pieces come in.

use alloc::vec;
use alloc::vec::Vec;

use crate::error::CodecError;

/// Dictionary capacity. Codes never exceed 12 bits.
pub(crate) const MAX_DICTIONARY_ENTRIES: usize = 4096;
const MAX_DICTIONARY_ENTRY_BITS: u8 = 12;

/// Receives rows of palette indices as they are decompressed.
pub(crate) trait RowSink {
    /// `row` holds frame row `y`, to be shown on `repeat` consecutive rows
    /// starting at `y`.
    fn write_row(&mut self, row: &[u8], y: usize, repeat: usize);
}

/// Geometry of the frame being decompressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct LzwFrame {
    pub width: usize,
    pub height: usize,
    pub interlaced: bool,
    /// Replicate interlaced rows while passes stream in.
    pub progressive: bool,
    /// Minimum code size from the image data header.
    pub data_size: u8,
}

/// Next frame row to be written, and the interlace pass it belongs to.
///
/// Pass 0 means the frame is not interlaced; passes 1 to 4 step through
/// rows 8, 8, 4 and 2 apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RowCursor {
    pub pass: u8,
    pub row: usize,
}

impl RowCursor {
    pub(crate) fn start(interlaced: bool) -> Self {
        Self {
            pass: u8::from(interlaced),
            row: 0,
        }
    }

    /// First row and row count covered by the row at the cursor.
    ///
    /// Progressive interlaced frames stretch each early-pass row over the
    /// rows later passes will fill, shifted up so the image does not appear
    /// to crawl down the screen.
    pub(crate) fn span(&self, frame: &LzwFrame) -> Option<(usize, usize)> {
        let height = frame.height as i64;
        let mut start = self.row as i64;
        let mut end = start;
        if frame.progressive && frame.interlaced && self.pass < 4 {
            let (dup, shift) = match self.pass {
                1 => (7, 3),
                2 => (3, 1),
                3 => (1, 0),
                _ => (0, 0),
            };
            start -= shift;
            end = start + dup;
            let last = height - 1;
            // Extend to the bottom edge when the upward shift leaves it bare.
            if end <= last && last - end <= shift {
                end = last;
            }
            start = start.max(0);
            end = end.min(last);
        }
        if start >= height {
            return None;
        }
        Some((start as usize, (end - start + 1) as usize))
    }

    /// Move to the next row in display order for this frame.
    pub(crate) fn advance(&mut self, frame: &LzwFrame) {
        if !frame.interlaced {
            self.row += 1;
            return;
        }
        let height = frame.height;
        loop {
            let (step, next_start) = match self.pass {
                1 => (8, 4),
                2 => (8, 2),
                3 => (4, 1),
                4 => (2, 0),
                _ => break,
            };
            self.row += step;
            if self.row >= height {
                self.pass += 1;
                self.row = next_start;
            }
            if self.row < height {
                break;
            }
        }
    }
}

/// Incremental LZW decoder for one frame.
pub(crate) struct LzwDecoder {
    frame: LzwFrame,
    clear_code: usize,
    code_size: u32,
    code_mask: usize,
    avail: usize,
    old_code: Option<usize>,
    first_char: u8,
    datum: u32,
    bits: u32,
    prefix: Vec<u16>,
    suffix: Vec<u8>,
    suffix_len: Vec<u16>,
    /// Decoded indices not yet emitted as rows, `row_buffer[..row_end]`.
    row_buffer: Vec<u8>,
    row_end: usize,
    cursor: RowCursor,
    rows_remaining: usize,
}

impl LzwDecoder {
    pub(crate) fn new(frame: LzwFrame) -> Result<Self, CodecError> {
        // Codes are one bit wider than the data size and must fit 12 bits.
        if frame.data_size >= MAX_DICTIONARY_ENTRY_BITS {
            return Err(CodecError::invalid(alloc::format!(
                "gif lzw minimum code size {} is too large",
                frame.data_size
            )));
        }
        if frame.width == 0 || frame.height == 0 {
            return Err(CodecError::invalid("gif frame has no pixels"));
        }
        let clear_code = 1usize << frame.data_size;
        let code_size = u32::from(frame.data_size) + 1;

        let mut suffix = vec![0u8; MAX_DICTIONARY_ENTRIES];
        let mut suffix_len = vec![0u16; MAX_DICTIONARY_ENTRIES];
        for i in 0..clear_code {
            suffix[i] = i as u8;
            suffix_len[i] = 1;
        }

        // The longest code expands to MAX_DICTIONARY_ENTRIES - 1 bytes, and
        // up to one row minus a pixel may be waiting in front of it.
        let row_buffer = vec![0u8; frame.width - 1 + MAX_DICTIONARY_ENTRIES - 1];

        Ok(Self {
            frame,
            clear_code,
            code_size,
            code_mask: (1 << code_size) - 1,
            avail: clear_code + 2,
            old_code: None,
            first_char: 0,
            datum: 0,
            bits: 0,
            prefix: vec![0u16; MAX_DICTIONARY_ENTRIES],
            suffix,
            suffix_len,
            row_buffer,
            row_end: 0,
            cursor: RowCursor::start(frame.interlaced),
            rows_remaining: frame.height,
        })
    }

    pub(crate) fn has_remaining_rows(&self) -> bool {
        self.rows_remaining > 0
    }

    #[cfg(test)]
    pub(crate) fn cursor(&self) -> RowCursor {
        self.cursor
    }

    /// Decompress one data sub-block, emitting every row it completes.
    ///
    /// Bytes after the last row are ignored. An error means the data is
    /// corrupt and the frame cannot be decoded further.
    pub(crate) fn decode_block(
        &mut self,
        block: &[u8],
        sink: &mut dyn RowSink,
    ) -> Result<(), CodecError> {
        if self.rows_remaining == 0 {
            return Ok(());
        }
        for &byte in block {
            self.datum += u32::from(byte) << self.bits;
            self.bits += 8;

            while self.bits >= self.code_size {
                let mut code = self.datum as usize & self.code_mask;
                self.datum >>= self.code_size;
                self.bits -= self.code_size;

                if code == self.clear_code {
                    self.code_size = u32::from(self.frame.data_size) + 1;
                    self.code_mask = (1 << self.code_size) - 1;
                    self.avail = self.clear_code + 2;
                    self.old_code = None;
                    continue;
                }

                if code == self.clear_code + 1 {
                    if self.rows_remaining == 0 {
                        return Ok(());
                    }
                    return Err(CodecError::invalid("gif lzw end code before the last row"));
                }

                let this_code = code;
                let code_len = if code < self.avail {
                    usize::from(self.suffix_len[code])
                } else if let (true, Some(old)) = (code == self.avail, self.old_code) {
                    usize::from(self.suffix_len[old]) + 1
                } else {
                    return Err(CodecError::invalid(alloc::format!(
                        "gif lzw code {code} is not in the dictionary"
                    )));
                };

                let end = self.row_end + code_len;
                if code_len == 0 || end > self.row_buffer.len() {
                    return Err(CodecError::invalid("gif lzw dictionary is corrupt"));
                }

                // Expand the code back to front.
                let mut pos = end;
                if code == self.avail {
                    pos -= 1;
                    self.row_buffer[pos] = self.first_char;
                    code = self.old_code.unwrap_or(0);
                }
                while code >= self.clear_code {
                    if pos <= self.row_end + 1 {
                        return Err(CodecError::invalid("gif lzw dictionary is corrupt"));
                    }
                    pos -= 1;
                    self.row_buffer[pos] = self.suffix[code];
                    code = usize::from(self.prefix[code]);
                }
                self.first_char = self.suffix[code];
                pos -= 1;
                self.row_buffer[pos] = self.first_char;

                if self.avail < MAX_DICTIONARY_ENTRIES
                    && let Some(old) = self.old_code
                {
                    self.prefix[self.avail] = old as u16;
                    self.suffix[self.avail] = self.first_char;
                    self.suffix_len[self.avail] = self.suffix_len[old] + 1;
                    self.avail += 1;

                    if (self.avail & self.code_mask) == 0 && self.avail < MAX_DICTIONARY_ENTRIES {
                        self.code_size += 1;
                        self.code_mask += self.avail;
                    }
                }
                self.old_code = Some(this_code);
                self.row_end = end;

                let width = self.frame.width;
                let mut begin = 0;
                while begin + width <= self.row_end {
                    emit_row(
                        &self.frame,
                        &mut self.cursor,
                        &self.row_buffer[begin..begin + width],
                        sink,
                    );
                    self.rows_remaining -= 1;
                    if self.rows_remaining == 0 {
                        return Ok(());
                    }
                    begin += width;
                }
                if begin != 0 {
                    self.row_buffer.copy_within(begin..self.row_end, 0);
                    self.row_end -= begin;
                }
            }
        }
        Ok(())
    }
}

fn emit_row(frame: &LzwFrame, cursor: &mut RowCursor, row: &[u8], sink: &mut dyn RowSink) {
    if let Some((y, repeat)) = cursor.span(frame) {
        sink.write_row(row, y, repeat);
    }
    cursor.advance(frame);
}
