//! Channel bit masks for bit-field pixel formats.
//!
//! Each channel is described by the bits it occupies in a packed pixel: a
//! shift to its lowest bit and a width. Components narrower than 8 bits are
//! widened through [`EXPAND_TO_8`].

use crate::error::CodecError;

/// Nearest 8-bit value for every n-bit component, n in 1..=7.
///
/// The entries for width `n` start at index `(1 << n) - 2`, so component
/// `c` of width `n` expands to `EXPAND_TO_8[(1 << n) - 2 + c]`.
pub(crate) const EXPAND_TO_8: [u8; 254] = build_expand_table();

const fn build_expand_table() -> [u8; 254] {
    let mut table = [0u8; 254];
    let mut bits = 1;
    while bits < 8 {
        let max = (1u32 << bits) - 1;
        let base = (1usize << bits) - 2;
        let mut c = 0;
        while c <= max {
            table[base + c as usize] = ((c * 255 * 2 + max) / (2 * max)) as u8;
            c += 1;
        }
        bits += 1;
    }
    table
}

/// Widen an n-bit component to 8 bits.
#[inline]
pub(crate) fn expand_to_8(component: u32, bits: u32) -> u8 {
    match bits {
        0 => 0,
        1..=7 => EXPAND_TO_8[(1usize << bits) - 2 + component as usize],
        _ => component as u8,
    }
}

/// Raw masks as they appear in a header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputMasks {
    pub red: u32,
    pub green: u32,
    pub blue: u32,
    pub alpha: u32,
}

/// Position of one channel inside a packed pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MaskInfo {
    pub mask: u32,
    pub shift: u32,
    pub size: u32,
}

impl MaskInfo {
    fn from_mask(mut mask: u32) -> Self {
        if mask == 0 {
            return Self::default();
        }
        let mut shift = mask.trailing_zeros();
        let mut rest = mask >> shift;
        let mut size = rest.trailing_ones();
        rest >>= size;
        if rest != 0 {
            log::warn!("bit mask {mask:#010x} is not contiguous");
            size += 32 - rest.leading_zeros();
        }
        if size > 8 {
            shift += size - 8;
            size = 8;
            mask &= 0xff << shift;
        }
        Self { mask, shift, size }
    }

    /// This channel of `pixel`, widened to 8 bits.
    #[inline]
    pub fn extract(&self, pixel: u32) -> u8 {
        expand_to_8((pixel & self.mask) >> self.shift, self.size)
    }
}

/// Validated channel layout for 16, 24 or 32-bit pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitMaskSet {
    pub red: MaskInfo,
    pub green: MaskInfo,
    pub blue: MaskInfo,
    pub alpha: MaskInfo,
}

impl BitMaskSet {
    /// Trim `masks` to `bits_per_pixel`, reject overlapping channels and
    /// derive each channel's shift and width.
    pub fn new(masks: InputMasks, bits_per_pixel: u16) -> Result<Self, CodecError> {
        let mut masks = masks;
        if bits_per_pixel < 32 {
            let keep = (1u32 << bits_per_pixel) - 1;
            masks.red &= keep;
            masks.green &= keep;
            masks.blue &= keep;
            masks.alpha &= keep;
        }
        let InputMasks {
            red,
            green,
            blue,
            alpha,
        } = masks;
        let overlap = (red & green)
            | (red & blue)
            | (red & alpha)
            | (green & blue)
            | (green & alpha)
            | (blue & alpha);
        if overlap != 0 {
            return Err(CodecError::invalid(alloc::format!(
                "bit masks overlap ({overlap:#010x})"
            )));
        }
        Ok(Self {
            red: MaskInfo::from_mask(red),
            green: MaskInfo::from_mask(green),
            blue: MaskInfo::from_mask(blue),
            alpha: MaskInfo::from_mask(alpha),
        })
    }

    pub fn has_alpha(&self) -> bool {
        self.alpha.mask != 0
    }
}
