//! Row transforms from source pixel layouts to destination layouts.
//!
//! Every pixel decoder reads one encoded row into scratch memory and hands
//! it to a swizzler, which expands it to the destination layout while
//! applying column sampling and a destination offset.

pub(crate) mod mask_swizzler;
pub(crate) mod masks;
pub(crate) mod sampler;

use alloc::rc::Rc;

use crate::color::{ColorTable, PackKind};
use crate::error::CodecError;
use crate::pixel::PixelLayout;
use sampler::{scaled_dimension, start_coord};

/// Layout of one encoded source row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SrcFormat {
    /// Palette indices packed `bits` (1, 2, 4 or 8) to a pixel, high bits first.
    Index { bits: u8 },
    /// 24-bit blue, green, red.
    Bgr,
    /// 32-bit blue, green, red and an ignored fourth byte.
    Bgrx,
    /// 32-bit blue, green, red, alpha.
    Bgra,
}

pub(crate) struct Swizzler {
    src: SrcFormat,
    dst: PixelLayout,
    pack: PackKind,
    table: Option<Rc<ColorTable>>,
    start: usize,
    step: usize,
    width: usize,
    dst_offset_bytes: usize,
}

impl Swizzler {
    /// A swizzler writing `src_width` source pixels, sampled every `sample_x`,
    /// into a destination row of `dst_width` pixels starting at pixel
    /// `dst_offset` (both in unsampled coordinates).
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        src: SrcFormat,
        dst: PixelLayout,
        pack: PackKind,
        table: Option<Rc<ColorTable>>,
        src_width: usize,
        dst_width: usize,
        dst_offset: usize,
        sample_x: usize,
    ) -> Result<Self, CodecError> {
        match (src, dst) {
            (SrcFormat::Index { .. }, PixelLayout::Index8) => {}
            (_, PixelLayout::Index8) => {
                return Err(CodecError::conversion(
                    "only palette sources can be written as indices",
                ));
            }
            (SrcFormat::Index { .. }, _) if table.is_none() => {
                return Err(CodecError::invalid("palette source without a color table"));
            }
            _ => {}
        }
        let sample_x = sample_x.max(1);
        let width = scaled_dimension(src_width, sample_x);
        let allocated = scaled_dimension(dst_width, sample_x);
        // A frame narrower than the destination samples at its own rate so
        // the first kept column stays inside the frame.
        let frame_sample = if src_width < dst_width {
            (src_width / width.max(1)).max(1)
        } else {
            sample_x
        };
        let bpp = dst.bytes_per_pixel();
        let mut dst_offset_bytes = (dst_offset / sample_x) * bpp;
        if dst_offset_bytes + width * bpp > allocated * bpp {
            dst_offset_bytes = allocated.saturating_sub(width) * bpp;
        }
        Ok(Self {
            src,
            dst,
            pack,
            table,
            start: start_coord(frame_sample),
            step: sample_x,
            width,
            dst_offset_bytes,
        })
    }

    pub(crate) fn swizzle_width(&self) -> usize {
        self.width
    }

    pub(crate) fn offset_bytes(&self) -> usize {
        self.dst_offset_bytes
    }

    /// Expand one source row into `dst_row` (a full destination row).
    pub(crate) fn swizzle(&self, dst_row: &mut [u8], src_row: &[u8]) {
        let bpp = self.dst.bytes_per_pixel();
        let end = (self.dst_offset_bytes + self.width * bpp).min(dst_row.len());
        let out = &mut dst_row[self.dst_offset_bytes.min(end)..end];
        match self.src {
            SrcFormat::Index { bits } => self.swizzle_index(out, src_row, bits),
            SrcFormat::Bgr => self.swizzle_direct::<3, false>(out, src_row),
            SrcFormat::Bgrx => self.swizzle_direct::<4, false>(out, src_row),
            SrcFormat::Bgra => self.swizzle_direct::<4, true>(out, src_row),
        }
    }

    fn swizzle_index(&self, out: &mut [u8], src: &[u8], bits: u8) {
        let bits = usize::from(bits);
        let mask = (1u16 << bits) - 1;
        let index_at = |x: usize| -> u8 {
            let bit = x * bits;
            let byte = src.get(bit / 8).copied().unwrap_or(0);
            let shift = 8 - bits - (bit % 8);
            ((u16::from(byte) >> shift) & mask) as u8
        };
        if self.dst == PixelLayout::Index8 {
            for (i, px) in out.iter_mut().enumerate() {
                *px = index_at(self.start + i * self.step);
            }
            return;
        }
        let Some(table) = &self.table else {
            return;
        };
        for (i, px) in out.chunks_exact_mut(4).enumerate() {
            px.copy_from_slice(&table.get(index_at(self.start + i * self.step)));
        }
    }

    fn swizzle_direct<const SRC_BYTES: usize, const ALPHA: bool>(&self, out: &mut [u8], src: &[u8]) {
        for (i, px) in out.chunks_exact_mut(4).enumerate() {
            let off = (self.start + i * self.step) * SRC_BYTES;
            let Some(s) = src.get(off..off + SRC_BYTES) else {
                break;
            };
            let a = if ALPHA { s[3] } else { 0xff };
            px.copy_from_slice(&self.pack.pack(s[2], s[1], s[0], a));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba() -> PackKind {
        PackKind {
            bgra: false,
            premultiply: false,
        }
    }

    fn two_color_table() -> Rc<ColorTable> {
        let mut t = ColorTable::new();
        t.push([0, 0, 0, 255]);
        t.push([255, 255, 255, 255]);
        Rc::new(t)
    }

    #[test]
    fn one_bit_indices() {
        let sw = Swizzler::new(
            SrcFormat::Index { bits: 1 },
            PixelLayout::Index8,
            rgba(),
            None,
            10,
            10,
            0,
            1,
        )
        .unwrap();
        let mut dst = [0u8; 10];
        sw.swizzle(&mut dst, &[0b1010_0001, 0b1100_0000]);
        assert_eq!(dst, [1, 0, 1, 0, 0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn four_bit_through_table() {
        let sw = Swizzler::new(
            SrcFormat::Index { bits: 4 },
            PixelLayout::Rgba8,
            rgba(),
            Some(two_color_table()),
            3,
            3,
            0,
            1,
        )
        .unwrap();
        let mut dst = [9u8; 12];
        sw.swizzle(&mut dst, &[0x10, 0x10]);
        assert_eq!(
            dst,
            [255, 255, 255, 255, 0, 0, 0, 255, 255, 255, 255, 255]
        );
    }

    #[test]
    fn bgr_to_bgra_sampled() {
        let pack = PackKind {
            bgra: true,
            premultiply: false,
        };
        let sw = Swizzler::new(SrcFormat::Bgr, PixelLayout::Bgra8, pack, None, 4, 4, 0, 2).unwrap();
        assert_eq!(sw.swizzle_width(), 2);
        let src = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
        let mut dst = [0u8; 8];
        sw.swizzle(&mut dst, &src);
        assert_eq!(dst, [4, 5, 6, 255, 10, 11, 12, 255]);
    }

    #[test]
    fn destination_offset() {
        let sw = Swizzler::new(
            SrcFormat::Index { bits: 8 },
            PixelLayout::Rgba8,
            rgba(),
            Some(two_color_table()),
            2,
            4,
            1,
            1,
        )
        .unwrap();
        assert_eq!(sw.offset_bytes(), 4);
        let mut dst = [7u8; 16];
        sw.swizzle(&mut dst, &[1, 0]);
        assert_eq!(&dst[..4], &[7; 4]);
        assert_eq!(&dst[4..12], &[255, 255, 255, 255, 0, 0, 0, 255]);
        assert_eq!(&dst[12..], &[7; 4]);
    }

    #[test]
    fn truecolor_cannot_be_indexed() {
        assert!(
            Swizzler::new(SrcFormat::Bgra, PixelLayout::Index8, rgba(), None, 1, 1, 0, 1).is_err()
        );
    }
}
