//! RLE4, RLE8 and RLE24 pixel data.
//!
//! The encoded stream is a sequence of two-byte tokens. A nonzero first byte
//! repeats one color; a zero first byte escapes to end-of-line, end-of-file,
//! a cursor delta or a literal run. Tokens are consumed whole: when a token
//! and its payload have not fully arrived, decoding pauses before it and the
//! cursor is left untouched, so a later call resumes at the same token.

use enough::Stop;

use super::header::BmpHeader;
use crate::color::{ColorTable, PackKind};
use crate::decode::Target;
use crate::error::CodecError;
use crate::stream::SourceBuffer;

const ESCAPE: u8 = 0;
const END_OF_LINE: u8 = 0;
const END_OF_FILE: u8 = 1;
const DELTA: u8 = 2;

/// Resumable position in the encoded stream and the image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct RleCursor {
    pub pos: usize,
    pub x: usize,
    pub y: usize,
}

pub(crate) struct RleDecoder {
    target: Target,
    pack: PackKind,
    table: Option<ColorTable>,
    bits_per_pixel: u16,
    width: usize,
    height: usize,
    end: usize,
    cursor: RleCursor,
    background_filled: bool,
}

/// Outcome of one token.
enum Step {
    Continue,
    Finished,
    /// More bytes are needed before this token can be consumed.
    Pause,
}

impl RleDecoder {
    pub(crate) fn new(header: &BmpHeader, target: Target) -> Self {
        let pack = target.pack();
        Self {
            target,
            pack,
            table: header.color_table.as_ref().map(|t| t.repacked(pack)),
            bits_per_pixel: header.bits_per_pixel,
            width: header.width as usize,
            height: header.height as usize,
            end: header.data_end.unwrap_or(usize::MAX),
            cursor: RleCursor {
                pos: header.pixel_offset,
                x: 0,
                y: 0,
            },
            background_filled: false,
        }
    }

    pub(crate) fn target(&self) -> &Target {
        &self.target
    }

    #[cfg(test)]
    pub(crate) fn cursor(&self) -> RleCursor {
        self.cursor
    }

    pub(crate) fn decode_rows(
        &mut self,
        header: &BmpHeader,
        source: &SourceBuffer,
        dst: &mut [u8],
        stride: usize,
        stop: &dyn Stop,
    ) -> Result<usize, CodecError> {
        if !self.background_filled {
            // Tokens may skip pixels; those stay transparent.
            self.target.fill_all(dst, stride);
            self.background_filled = true;
        }
        let data = &source.as_slice()[..source.len().min(self.end)];
        let mut checked_row = self.cursor.y;
        loop {
            if self.cursor.y >= self.height {
                return Ok(self.target.height());
            }
            if self.cursor.y >= checked_row + 16 {
                stop.check()?;
                checked_row = self.cursor.y;
            }
            match self.step(header, data, dst, stride) {
                Step::Continue => {}
                Step::Finished => return Ok(self.target.height()),
                Step::Pause => {
                    return Err(CodecError::IncompleteInput {
                        rows_decoded: self.target.sampler.dst_rows_before(self.cursor.y),
                    });
                }
            }
        }
    }

    /// Consume one token at the cursor.
    fn step(&mut self, header: &BmpHeader, data: &[u8], dst: &mut [u8], stride: usize) -> Step {
        let RleCursor { pos, x, y } = self.cursor;
        let Some(&[flag, task]) = data.get(pos..pos + 2) else {
            return Step::Pause;
        };

        if flag != ESCAPE {
            let end_x = (x + usize::from(flag)).min(self.width);
            if self.bits_per_pixel == 24 {
                // The token's second byte is blue; green and red follow.
                let Some(&[green, red]) = data.get(pos + 2..pos + 4) else {
                    return Step::Pause;
                };
                let color = self.pack.pack(red, green, task, 0xff);
                for px in x..end_x {
                    self.set_pixel(header, dst, stride, px, y, color);
                }
                self.cursor.pos += 4;
            } else {
                let indices = if self.bits_per_pixel == 4 {
                    [task >> 4, task & 0xf]
                } else {
                    [task, task]
                };
                for (i, px) in (x..end_x).enumerate() {
                    self.set_index(header, dst, stride, px, y, indices[i % 2]);
                }
                self.cursor.pos += 2;
            }
            self.cursor.x = end_x;
            return Step::Continue;
        }

        match task {
            END_OF_LINE => {
                self.cursor = RleCursor {
                    pos: pos + 2,
                    x: 0,
                    y: y + 1,
                };
                Step::Continue
            }
            END_OF_FILE => {
                self.cursor.pos += 2;
                Step::Finished
            }
            DELTA => {
                let Some(&[dx, dy]) = data.get(pos + 2..pos + 4) else {
                    return Step::Pause;
                };
                let (nx, ny) = (x + usize::from(dx), y + usize::from(dy));
                if nx > self.width {
                    log::warn!("rle delta moves to column {nx} of {}", self.width);
                    return Step::Pause;
                }
                self.cursor = RleCursor {
                    pos: pos + 4,
                    x: nx,
                    y: ny,
                };
                Step::Continue
            }
            count => {
                let count = usize::from(count);
                if x + count > self.width {
                    log::warn!("rle literal run of {count} overflows row at column {x}");
                    return Step::Pause;
                }
                let run_bytes = (count * usize::from(self.bits_per_pixel)).div_ceil(8);
                let aligned = run_bytes + (run_bytes & 1);
                let Some(run) = data.get(pos + 2..pos + 2 + aligned) else {
                    return Step::Pause;
                };
                match self.bits_per_pixel {
                    4 => {
                        for i in 0..count {
                            let byte = run[i / 2];
                            let index = if i % 2 == 0 { byte >> 4 } else { byte & 0xf };
                            self.set_index(header, dst, stride, x + i, y, index);
                        }
                    }
                    24 => {
                        for (i, bgr) in run.chunks_exact(3).take(count).enumerate() {
                            let color = self.pack.pack(bgr[2], bgr[1], bgr[0], 0xff);
                            self.set_pixel(header, dst, stride, x + i, y, color);
                        }
                    }
                    _ => {
                        for (i, &index) in run[..count].iter().enumerate() {
                            self.set_index(header, dst, stride, x + i, y, index);
                        }
                    }
                }
                self.cursor.pos = pos + 2 + aligned;
                self.cursor.x = x + count;
                Step::Continue
            }
        }
    }

    fn set_index(
        &self,
        header: &BmpHeader,
        dst: &mut [u8],
        stride: usize,
        x: usize,
        y: usize,
        index: u8,
    ) {
        if let Some(table) = &self.table {
            self.set_pixel(header, dst, stride, x, y, table.get(index));
        }
    }

    /// Write one pixel if sampling keeps its row and column.
    fn set_pixel(
        &self,
        header: &BmpHeader,
        dst: &mut [u8],
        stride: usize,
        x: usize,
        y: usize,
        color: [u8; 4],
    ) {
        let sampler = &self.target.sampler;
        let (Some(row), Some(col)) = (sampler.dst_row(y), sampler.dst_col(x)) else {
            return;
        };
        let row = header.dst_row(row, self.target.height());
        let at = row * stride + col * 4;
        if let Some(px) = dst.get_mut(at..at + 4) {
            px.copy_from_slice(&color);
        }
    }
}
