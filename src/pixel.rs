/// Pixel memory layout of a decode destination.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    /// One byte per pixel, an index into the decoder's [`crate::ColorTable`].
    Index8,
    /// 4 channels, 8-bit RGBA.
    Rgba8,
    /// 4 channels, 8-bit BGRA.
    Bgra8,
}

impl PixelLayout {
    /// Bytes per pixel for this layout.
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Index8 => 1,
            Self::Rgba8 | Self::Bgra8 => 4,
        }
    }

    /// Number of channels.
    pub fn channels(&self) -> usize {
        match self {
            Self::Index8 => 1,
            Self::Rgba8 | Self::Bgra8 => 4,
        }
    }

    /// Minimum row stride for `width` pixels.
    pub fn min_row_bytes(&self, width: u32) -> usize {
        width as usize * self.bytes_per_pixel()
    }
}

/// How alpha is represented, both for sources and destinations.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum AlphaMode {
    /// Every pixel is fully opaque.
    Opaque,
    /// Color channels are independent of alpha.
    #[default]
    Unpremultiplied,
    /// Color channels are scaled by alpha.
    Premultiplied,
}

impl AlphaMode {
    pub fn is_opaque(self) -> bool {
        self == Self::Opaque
    }
}

/// Pixel types that can be viewed from a decoded buffer.
#[cfg(feature = "rgb")]
pub trait DecodePixel: Copy + 'static {
    fn layout() -> PixelLayout;
}

#[cfg(feature = "rgb")]
impl DecodePixel for rgb::RGBA8 {
    fn layout() -> PixelLayout {
        PixelLayout::Rgba8
    }
}

#[cfg(feature = "rgb")]
impl DecodePixel for rgb::alt::BGRA8 {
    fn layout() -> PixelLayout {
        PixelLayout::Bgra8
    }
}
