//! Drawing decoded frame rows onto the screen-sized destination.

use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;

use enough::Stop;

use crate::color::{ColorTable, PackKind};
use crate::decode::Target;
use crate::error::CodecError;
use crate::stream::SourceBuffer;
use crate::swizzle::sampler::Sampler;
use crate::swizzle::{SrcFormat, Swizzler};

use super::frame::{FrameContext, FrameRect};
use super::lzw::{LzwDecoder, LzwFrame, RowSink};

/// Row placement state for one frame decode.
struct FrameWriter {
    sampler: Sampler,
    bytes_per_pixel: usize,
    row_bytes: usize,
    frame_y: usize,
    screen_height: usize,
    /// `None` when no column of the frame lands on the screen.
    swizzler: Option<Swizzler>,
    write_transparent: bool,
    filled_background: bool,
    rows_decoded: usize,
    scratch: Vec<u8>,
}

impl FrameWriter {
    fn write_row(&mut self, dst: &mut [u8], stride: usize, row: &[u8], y: usize, repeat: usize) {
        let Some(swizzler) = &self.swizzler else {
            return;
        };
        let y_begin = self.frame_y + y;
        if y_begin >= self.screen_height {
            return;
        }

        let sampler = self.sampler;
        let (dst_y, repeat) = if sampler.sample_y > 1 {
            // Use the first of the repeated rows that survives sampling, and
            // fold the repeat count down to sampled rows.
            let Some((skipped, dst_y)) =
                (0..repeat).find_map(|i| sampler.dst_row(y_begin + i).map(|d| (i, d)))
            else {
                return;
            };
            let repeat = (repeat - skipped - 1) / sampler.sample_y + 1;
            (dst_y, repeat.min(sampler.scaled_height() - dst_y))
        } else {
            (y_begin, repeat.min(self.screen_height - y_begin))
        };

        // Rows under a pre-filled background were already counted.
        if !self.filled_background {
            self.rows_decoded += 1;
        }

        let start = dst_y * stride;
        let line = &mut dst[start..start + self.row_bytes];
        let offset = swizzler.offset_bytes().min(line.len());
        let end = (offset + swizzler.swizzle_width() * self.bytes_per_pixel).min(line.len());
        if self.write_transparent {
            swizzler.swizzle(line, row);
        } else {
            // Transparent entries are all zero; leave the pixels below them.
            swizzler.swizzle(&mut self.scratch, row);
            let src = self.scratch[offset..end].chunks_exact(self.bytes_per_pixel);
            for (px, new) in line[offset..end]
                .chunks_exact_mut(self.bytes_per_pixel)
                .zip(src)
            {
                if new.iter().any(|&b| b != 0) {
                    px.copy_from_slice(new);
                }
            }
        }

        for i in 1..repeat {
            dst.copy_within(start + offset..start + end, start + i * stride + offset);
        }
    }
}

struct RowTarget<'a> {
    writer: &'a mut FrameWriter,
    dst: &'a mut [u8],
    stride: usize,
}

impl RowSink for RowTarget<'_> {
    fn write_row(&mut self, row: &[u8], y: usize, repeat: usize) {
        self.writer.write_row(self.dst, self.stride, row, y, repeat);
    }
}

/// Decodes one frame into the destination, resumable across calls.
pub(crate) struct FrameDecoder {
    writer: FrameWriter,
    has_table: bool,
    lzw: Option<LzwDecoder>,
    next_block: usize,
    failed: bool,
}

impl FrameDecoder {
    /// Prepare to draw `frame`, filling the background first when the frame
    /// is independent and will not cover every pixel itself.
    pub(crate) fn new(
        frame: &FrameContext,
        table: Option<Rc<ColorTable>>,
        target: &Target,
        screen: (u32, u32),
        dst: &mut [u8],
        stride: usize,
    ) -> Result<Self, CodecError> {
        let (screen_width, screen_height) = screen;
        let has_table = table.is_some();
        let x_begin = frame.rect.x.min(screen_width) as usize;
        let x_end = frame.rect.right().min(screen_width) as usize;
        let swizzler = match table {
            Some(table) if x_begin < x_end => Some(Swizzler::new(
                SrcFormat::Index { bits: 8 },
                target.layout,
                pack_for(target),
                Some(table),
                x_end - x_begin,
                screen_width as usize,
                x_begin,
                target.sampler.sample_x,
            )?),
            _ => None,
        };

        let filled_background = match frame.required_frame {
            // The required frame is already in the destination.
            Some(_) => true,
            None => {
                let needs_fill = !frame.rect.is_screen(screen_width, screen_height)
                    || frame.interlaced
                    || !has_table;
                if needs_fill {
                    target.fill_all(dst, stride);
                }
                needs_fill
            }
        };

        Ok(Self {
            writer: FrameWriter {
                sampler: target.sampler,
                bytes_per_pixel: target.layout.bytes_per_pixel(),
                row_bytes: target.row_bytes(),
                frame_y: frame.rect.y as usize,
                screen_height: screen_height as usize,
                swizzler,
                write_transparent: frame.required_frame.is_none(),
                filled_background,
                rows_decoded: if filled_background { target.height() } else { 0 },
                scratch: vec![0u8; target.row_bytes()],
            },
            has_table,
            lzw: None,
            next_block: 0,
            failed: false,
        })
    }

    /// Decode every data block parsed so far.
    ///
    /// Returns the output height once the frame is complete, or
    /// [`CodecError::IncompleteInput`] / [`CodecError::ErrorInInput`] with
    /// the rows written so far.
    pub(crate) fn decode(
        &mut self,
        frame: &FrameContext,
        source: &SourceBuffer,
        dst: &mut [u8],
        stride: usize,
        stop: &dyn Stop,
    ) -> Result<usize, CodecError> {
        let height = self.writer.sampler.scaled_height();
        if !self.has_table {
            // Nothing to draw.
            return Ok(height);
        }
        if self.failed {
            return Err(CodecError::ErrorInInput {
                rows_decoded: self.writer.rows_decoded,
            });
        }

        if self.lzw.is_none() {
            let Some(data_size) = frame.data_size else {
                return Err(CodecError::IncompleteInput {
                    rows_decoded: self.writer.rows_decoded,
                });
            };
            let lzw = LzwDecoder::new(LzwFrame {
                width: frame.rect.width as usize,
                height: frame.rect.height as usize,
                interlaced: frame.interlaced,
                progressive: frame.progressive,
                data_size,
            });
            match lzw {
                Ok(lzw) => self.lzw = Some(lzw),
                Err(e) => return Err(self.fail(frame, &e)),
            }
        }

        while let Some(lzw) = self.lzw.as_mut() {
            let Some(&block) = frame.blocks.get(self.next_block) else {
                break;
            };
            if !lzw.has_remaining_rows() {
                break;
            }
            stop.check()?;
            let Some(data) = source.get(block.position, block.len) else {
                return Err(self.fail(frame, &CodecError::invalid("lzw block out of range")));
            };
            let mut rows = RowTarget {
                writer: &mut self.writer,
                dst: &mut *dst,
                stride,
            };
            if let Err(e) = lzw.decode_block(data, &mut rows) {
                return Err(self.fail(frame, &e));
            }
            self.next_block += 1;
        }

        if frame.complete && self.writer.rows_decoded == height {
            Ok(height)
        } else {
            Err(CodecError::IncompleteInput {
                rows_decoded: self.writer.rows_decoded,
            })
        }
    }

    fn fail(&mut self, frame: &FrameContext, e: &CodecError) -> CodecError {
        log::warn!("gif frame {}: {e}", frame.id);
        self.failed = true;
        CodecError::ErrorInInput {
            rows_decoded: self.writer.rows_decoded,
        }
    }
}

/// GIF tables are opaque or fully transparent, so premultiplication never
/// changes them.
pub(crate) fn pack_for(target: &Target) -> PackKind {
    PackKind {
        bgra: target.layout == crate::pixel::PixelLayout::Bgra8,
        premultiply: false,
    }
}

/// Set the part of the destination covered by `rect` to the fill value.
pub(crate) fn erase_rect(
    target: &Target,
    dst: &mut [u8],
    stride: usize,
    rect: FrameRect,
    screen: (u32, u32),
) {
    let sampler = target.sampler;
    let (screen_width, screen_height) = screen;
    let x_range = rect.x as usize..rect.right().min(screen_width) as usize;
    let y_range = rect.y as usize..rect.bottom().min(screen_height) as usize;
    let fill = target.fill_value();
    let bpp = target.layout.bytes_per_pixel();
    for k in 0..target.height() {
        if !y_range.contains(&sampler.src_row(k)) {
            continue;
        }
        let row = &mut dst[k * stride..k * stride + target.row_bytes()];
        for (c, px) in row.chunks_exact_mut(bpp).enumerate() {
            if x_range.contains(&sampler.src_col(c)) {
                px.copy_from_slice(fill);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::DecodeOptions;
    use crate::info::{ImageFormat, ImageInfo};
    use crate::pixel::{AlphaMode, PixelLayout};

    fn target(w: u32, h: u32, sample: u32) -> Target {
        let info = ImageInfo {
            width: w,
            height: h,
            layout: PixelLayout::Rgba8,
            alpha: AlphaMode::Unpremultiplied,
            format: ImageFormat::Gif,
        };
        Target::new(&DecodeOptions::default().with_sample_size(sample), &info).unwrap()
    }

    #[test]
    fn erase_clips_to_screen() {
        let t = target(4, 3, 1);
        let mut dst = vec![9u8; 4 * 4 * 3];
        let rect = FrameRect {
            x: 2,
            y: 1,
            width: 5,
            height: 5,
        };
        erase_rect(&t, &mut dst, 16, rect, (4, 3));
        assert!(dst[..16].iter().all(|&b| b == 9));
        assert!(dst[16..24].iter().all(|&b| b == 9));
        assert!(dst[24..32].iter().all(|&b| b == 0));
        assert!(dst[40..48].iter().all(|&b| b == 0));
    }

    #[test]
    fn erase_follows_sampling() {
        // 4x4 sampled by 2 keeps source rows and columns 1 and 3.
        let t = target(4, 4, 2);
        let mut dst = vec![9u8; 2 * 4 * 2];
        let rect = FrameRect {
            x: 0,
            y: 0,
            width: 2,
            height: 2,
        };
        erase_rect(&t, &mut dst, 8, rect, (4, 4));
        assert_eq!(&dst[..8], &[0, 0, 0, 0, 9, 9, 9, 9]);
        assert!(dst[8..].iter().all(|&b| b == 9));
    }

    #[test]
    fn dependent_rows_keep_pixels_under_transparency() {
        let t = target(3, 1, 1);
        let mut table = ColorTable::new();
        table.push([0, 0, 0, 0]);
        table.push([255, 0, 0, 255]);
        table.pad_to(256, [0; 4]);
        let frame = FrameContext {
            rect: FrameRect {
                x: 0,
                y: 0,
                width: 3,
                height: 1,
            },
            required_frame: Some(0),
            ..FrameContext::new(1)
        };
        let mut dst = vec![7u8; 12];
        let mut decoder =
            FrameDecoder::new(&frame, Some(Rc::new(table)), &t, (3, 1), &mut dst, 12).unwrap();
        decoder.writer.write_row(&mut dst, 12, &[1, 0, 1], 0, 1);
        assert_eq!(dst, [255, 0, 0, 255, 7, 7, 7, 7, 255, 0, 0, 255]);
    }

    #[test]
    fn repeated_rows_are_copied_and_folded_by_sampling() {
        let t = target(2, 8, 2);
        let mut table = ColorTable::new();
        table.push([1, 2, 3, 255]);
        table.pad_to(256, [0; 4]);
        let frame = FrameContext {
            rect: FrameRect {
                x: 0,
                y: 0,
                width: 2,
                height: 8,
            },
            ..FrameContext::new(0)
        };
        let mut dst = vec![0u8; 4 * 4];
        let mut decoder =
            FrameDecoder::new(&frame, Some(Rc::new(table)), &t, (2, 8), &mut dst, 4).unwrap();
        // Source rows 0..5 map to sampled rows 0 and 1 (source rows 1 and 3).
        decoder.writer.write_row(&mut dst, 4, &[0, 0], 0, 5);
        assert_eq!(&dst[..8], &[1, 2, 3, 255, 1, 2, 3, 255]);
        assert!(dst[8..].iter().all(|&b| b == 0));
        assert_eq!(decoder.writer.rows_decoded, 1);
    }
}
