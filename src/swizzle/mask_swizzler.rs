//! Row transforms for bit-field pixels.
//!
//! One monomorphized row function exists per {16, 24, 32 bits per pixel} x
//! {RGBA, BGRA} x {opaque, unpremultiplied, premultiplied}; the swizzler
//! picks one when it is created.

use super::masks::BitMaskSet;
use crate::color::mul_div_255;
use crate::error::CodecError;
use crate::pixel::{AlphaMode, PixelLayout};

const OPAQUE: u8 = 0;
const UNPREMUL: u8 = 1;
const PREMUL: u8 = 2;

/// Reads `width` source pixels starting at pixel `start`, every `step`
/// pixels, and writes them contiguously to `dst`. Returns whether any pixel
/// had a nonzero alpha.
type MaskRowFn = fn(&mut [u8], &[u8], &BitMaskSet, usize, usize, usize) -> bool;

#[inline]
fn read_pixel<const SRC_BYTES: usize>(src: &[u8], x: usize) -> u32 {
    let off = x * SRC_BYTES;
    match SRC_BYTES {
        2 => u32::from(u16::from_le_bytes([src[off], src[off + 1]])),
        3 => u32::from_le_bytes([src[off], src[off + 1], src[off + 2], 0]),
        _ => u32::from_le_bytes([src[off], src[off + 1], src[off + 2], src[off + 3]]),
    }
}

fn swizzle_mask_row<const SRC_BYTES: usize, const BGRA: bool, const MODE: u8>(
    dst: &mut [u8],
    src: &[u8],
    masks: &BitMaskSet,
    start: usize,
    step: usize,
    width: usize,
) -> bool {
    let mut seen_alpha = false;
    for (i, out) in dst.chunks_exact_mut(4).take(width).enumerate() {
        let p = read_pixel::<SRC_BYTES>(src, start + i * step);
        let mut r = masks.red.extract(p);
        let mut g = masks.green.extract(p);
        let mut b = masks.blue.extract(p);
        let a = if MODE == OPAQUE {
            0xff
        } else {
            masks.alpha.extract(p)
        };
        seen_alpha |= a != 0;
        if MODE == PREMUL && a != 0xff {
            r = mul_div_255(r, a);
            g = mul_div_255(g, a);
            b = mul_div_255(b, a);
        }
        if BGRA {
            out.copy_from_slice(&[b, g, r, a]);
        } else {
            out.copy_from_slice(&[r, g, b, a]);
        }
    }
    seen_alpha
}

fn select<const SRC_BYTES: usize>(bgra: bool, mode: u8) -> MaskRowFn {
    match (bgra, mode) {
        (false, OPAQUE) => swizzle_mask_row::<SRC_BYTES, false, OPAQUE>,
        (false, UNPREMUL) => swizzle_mask_row::<SRC_BYTES, false, UNPREMUL>,
        (false, _) => swizzle_mask_row::<SRC_BYTES, false, PREMUL>,
        (true, OPAQUE) => swizzle_mask_row::<SRC_BYTES, true, OPAQUE>,
        (true, UNPREMUL) => swizzle_mask_row::<SRC_BYTES, true, UNPREMUL>,
        (true, _) => swizzle_mask_row::<SRC_BYTES, true, PREMUL>,
    }
}

/// Converts rows of 16/24/32-bit bit-field pixels to 8-bit RGBA or BGRA.
pub(crate) struct MaskSwizzler {
    row_fn: MaskRowFn,
    masks: BitMaskSet,
    start: usize,
    step: usize,
    width: usize,
}

impl MaskSwizzler {
    /// `alpha` is the destination alpha mode; sources without an alpha mask
    /// are always written opaque.
    pub(crate) fn new(
        masks: BitMaskSet,
        bits_per_pixel: u16,
        layout: PixelLayout,
        alpha: AlphaMode,
        src_width: usize,
        sample_x: usize,
    ) -> Result<Self, CodecError> {
        let bgra = match layout {
            PixelLayout::Rgba8 => false,
            PixelLayout::Bgra8 => true,
            other => {
                return Err(CodecError::conversion(alloc::format!(
                    "bit-mask pixels cannot be written as {other:?}"
                )));
            }
        };
        let mode = if !masks.has_alpha() {
            OPAQUE
        } else {
            match alpha {
                AlphaMode::Opaque => OPAQUE,
                AlphaMode::Unpremultiplied => UNPREMUL,
                AlphaMode::Premultiplied => PREMUL,
            }
        };
        let row_fn = match bits_per_pixel {
            16 => select::<2>(bgra, mode),
            24 => select::<3>(bgra, mode),
            32 => select::<4>(bgra, mode),
            other => {
                return Err(CodecError::invalid(alloc::format!(
                    "bit masks require 16, 24 or 32 bits per pixel, not {other}"
                )));
            }
        };
        let sample_x = sample_x.max(1);
        Ok(Self {
            row_fn,
            masks,
            start: super::sampler::start_coord(sample_x),
            step: sample_x,
            width: super::sampler::scaled_dimension(src_width, sample_x),
        })
    }

    /// The same swizzler, forced to write every pixel opaque.
    pub(crate) fn opaque(&self, bits_per_pixel: u16, bgra: bool) -> Self {
        let row_fn = match bits_per_pixel {
            16 => select::<2>(bgra, OPAQUE),
            24 => select::<3>(bgra, OPAQUE),
            _ => select::<4>(bgra, OPAQUE),
        };
        Self {
            row_fn,
            masks: self.masks,
            start: self.start,
            step: self.step,
            width: self.width,
        }
    }

    /// Swizzle one row. Returns whether any written pixel had nonzero alpha.
    pub(crate) fn swizzle(&self, dst: &mut [u8], src: &[u8]) -> bool {
        (self.row_fn)(dst, src, &self.masks, self.start, self.step, self.width)
    }
}
