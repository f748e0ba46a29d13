use crate::pixel::{AlphaMode, PixelLayout};

/// Container format, detected from magic bytes.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// Windows bitmap, `BM` signature.
    Bmp,
    /// Windows icon (`00 00 01 00`) or cursor (`00 00 02 00`).
    Ico,
    /// GIF87a or GIF89a.
    Gif,
}

impl ImageFormat {
    /// Sniff the signature at the start of `data`.
    ///
    /// Returns `None` when the bytes match no supported format, or are too
    /// short to tell.
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.starts_with(b"BM") {
            return Some(Self::Bmp);
        }
        if data.starts_with(&[0, 0, 1, 0]) || data.starts_with(&[0, 0, 2, 0]) {
            return Some(Self::Ico);
        }
        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Some(Self::Gif);
        }
        None
    }
}

/// Dimensions and suggested output of an opened image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    /// The layout that loses no information for this source.
    pub layout: PixelLayout,
    /// Alpha of the source. Opaque sources may be decoded to any alpha mode.
    pub alpha: AlphaMode,
    pub format: ImageFormat,
}

impl ImageInfo {
    /// Bytes needed for a tightly packed buffer in `layout`.
    pub fn buffer_size(&self, layout: PixelLayout) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(layout.bytes_per_pixel())
    }
}
