//! Packed colors and color tables.

use crate::error::CodecError;
use crate::pixel::{AlphaMode, PixelLayout};

/// Byte order and premultiplication used when packing a color for output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct PackKind {
    pub bgra: bool,
    pub premultiply: bool,
}

impl PackKind {
    /// Packing for a destination, given whether the source can carry alpha.
    ///
    /// Index8 destinations keep their table in unpremultiplied RGBA.
    pub(crate) fn for_output(layout: PixelLayout, alpha: AlphaMode, src_opaque: bool) -> Self {
        Self {
            bgra: layout == PixelLayout::Bgra8,
            premultiply: alpha == AlphaMode::Premultiplied && !src_opaque,
        }
    }

    #[inline]
    pub(crate) fn pack(self, r: u8, g: u8, b: u8, a: u8) -> [u8; 4] {
        let (r, g, b) = if self.premultiply && a != 255 {
            (mul_div_255(r, a), mul_div_255(g, a), mul_div_255(b, a))
        } else {
            (r, g, b)
        };
        if self.bgra { [b, g, r, a] } else { [r, g, b, a] }
    }
}

/// Rounded `a * b / 255`.
#[inline]
pub(crate) fn mul_div_255(a: u8, b: u8) -> u8 {
    let prod = u32::from(a) * u32::from(b) + 128;
    ((prod + (prod >> 8)) >> 8) as u8
}

/// Up to 256 packed colors indexed by palette entry.
///
/// Entries are already packed for the destination they were built for, so
/// index lookups copy four bytes without further conversion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorTable {
    colors: [[u8; 4]; 256],
    len: usize,
}

impl ColorTable {
    pub(crate) fn new() -> Self {
        Self {
            colors: [[0; 4]; 256],
            len: 0,
        }
    }

    pub(crate) fn push(&mut self, color: [u8; 4]) {
        if self.len < self.colors.len() {
            self.colors[self.len] = color;
            self.len += 1;
        }
    }

    /// Pad with `color` until the table holds `count` entries.
    pub(crate) fn pad_to(&mut self, count: usize, color: [u8; 4]) {
        while self.len < count.min(256) {
            self.push(color);
        }
    }

    /// Re-pack unpremultiplied RGBA entries for another destination.
    pub(crate) fn repacked(&self, pack: PackKind) -> Self {
        let mut out = Self::new();
        for &[r, g, b, a] in self.colors() {
            out.push(pack.pack(r, g, b, a));
        }
        out
    }

    #[inline]
    pub(crate) fn get(&self, index: u8) -> [u8; 4] {
        self.colors[usize::from(index)]
    }

    /// The packed entries.
    pub fn colors(&self) -> &[[u8; 4]] {
        &self.colors[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Check that a destination layout/alpha is reachable from a source.
pub(crate) fn check_conversion(
    dst_layout: PixelLayout,
    dst_alpha: AlphaMode,
    src_layout: PixelLayout,
    src_alpha: AlphaMode,
) -> Result<(), CodecError> {
    if dst_layout == PixelLayout::Index8 && src_layout != PixelLayout::Index8 {
        return Err(CodecError::conversion(
            "index output requires a palette source that cannot produce transparency",
        ));
    }
    if dst_alpha.is_opaque() && !src_alpha.is_opaque() {
        return Err(CodecError::conversion(
            "cannot decode an image with alpha to an opaque destination",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premultiply_rounds() {
        assert_eq!(mul_div_255(255, 255), 255);
        assert_eq!(mul_div_255(255, 0), 0);
        assert_eq!(mul_div_255(200, 128), 100);
        let kind = PackKind {
            bgra: true,
            premultiply: true,
        };
        assert_eq!(kind.pack(10, 20, 200, 128), [100, 10, 5, 128]);
    }

    #[test]
    fn table_padding() {
        let mut table = ColorTable::new();
        table.push([1, 2, 3, 255]);
        table.pad_to(4, [0, 0, 0, 255]);
        assert_eq!(table.len(), 4);
        assert_eq!(table.get(3), [0, 0, 0, 255]);
        table.pad_to(1000, [0; 4]);
        assert_eq!(table.len(), 256);

        let bgra = table.repacked(PackKind {
            bgra: true,
            premultiply: false,
        });
        assert_eq!(bgra.get(0), [3, 2, 1, 255]);
        assert_eq!(bgra.len(), 256);
    }

    #[test]
    fn conversions() {
        use AlphaMode::*;
        use PixelLayout::*;
        assert!(check_conversion(Rgba8, Premultiplied, Index8, Opaque).is_ok());
        assert!(check_conversion(Index8, Opaque, Index8, Opaque).is_ok());
        assert!(check_conversion(Index8, Opaque, Bgra8, Opaque).is_err());
        assert!(check_conversion(Bgra8, Opaque, Bgra8, Unpremultiplied).is_err());
    }
}
