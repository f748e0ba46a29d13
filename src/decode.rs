use alloc::vec;
use alloc::vec::Vec;

use enough::Stop;

#[cfg(feature = "rgb")]
use rgb::AsPixels as _;

use crate::color::{ColorTable, PackKind, check_conversion};
use crate::error::{CodecError, Status};
use crate::info::{ImageFormat, ImageInfo};
use crate::limits::Limits;
use crate::pixel::{AlphaMode, PixelLayout};
use crate::swizzle::sampler::{Sampler, check_buffer, fill};

#[cfg(feature = "bmp")]
use crate::bmp::BmpDecoder;
#[cfg(feature = "gif")]
use crate::gif::{FrameOptions, GifDecoder};
#[cfg(feature = "ico")]
use crate::ico::IcoDecoder;

// ── Options ─────────────────────────────────────────────────────────

/// Per-decode output configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeOptions {
    pub layout: PixelLayout,
    pub alpha: AlphaMode,
    /// Keep every `sample_size`th row and column. Must be at least 1.
    pub sample_size: u32,
    /// The destination is already zeroed, so zero fills can be skipped.
    pub zero_initialized: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            layout: PixelLayout::Rgba8,
            alpha: AlphaMode::Unpremultiplied,
            sample_size: 1,
            zero_initialized: false,
        }
    }
}

impl DecodeOptions {
    pub fn new(layout: PixelLayout) -> Self {
        Self {
            layout,
            ..Self::default()
        }
    }

    pub fn with_alpha(mut self, alpha: AlphaMode) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_sample_size(mut self, sample_size: u32) -> Self {
        self.sample_size = sample_size;
        self
    }

    pub fn with_zero_initialized(mut self, zero_initialized: bool) -> Self {
        self.zero_initialized = zero_initialized;
        self
    }
}

/// Options validated against one image.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Target {
    pub layout: PixelLayout,
    pub alpha: AlphaMode,
    pub src_alpha: AlphaMode,
    pub sampler: Sampler,
    pub zero_initialized: bool,
}

impl Target {
    pub(crate) fn new(opts: &DecodeOptions, info: &ImageInfo) -> Result<Self, CodecError> {
        check_conversion(opts.layout, opts.alpha, info.layout, info.alpha)?;
        Ok(Self {
            layout: opts.layout,
            alpha: opts.alpha,
            src_alpha: info.alpha,
            sampler: Sampler::new(opts.sample_size, info.width as usize, info.height as usize)?,
            zero_initialized: opts.zero_initialized,
        })
    }

    pub(crate) fn width(&self) -> usize {
        self.sampler.scaled_width()
    }

    pub(crate) fn height(&self) -> usize {
        self.sampler.scaled_height()
    }

    pub(crate) fn row_bytes(&self) -> usize {
        self.width() * self.layout.bytes_per_pixel()
    }

    pub(crate) fn check_buffer(&self, dst: &[u8], stride: usize) -> Result<(), CodecError> {
        check_buffer(dst, stride, self.row_bytes(), self.height())
    }

    /// Color packing for this destination.
    pub(crate) fn pack(&self) -> PackKind {
        PackKind::for_output(self.layout, self.alpha, self.src_alpha.is_opaque())
    }

    pub(crate) fn fill_value(&self) -> &'static [u8] {
        fill_value(self.layout, self.alpha)
    }

    /// Fill every output row with the fill value.
    pub(crate) fn fill_all(&self, dst: &mut [u8], stride: usize) {
        fill(
            dst,
            stride,
            self.width(),
            self.height(),
            self.fill_value(),
            self.zero_initialized,
        );
    }

    /// Fill the rows a partial decode did not reach.
    ///
    /// Rows are decoded top to bottom unless `bottom_up`, in which case the
    /// decoded rows are the last `rows_decoded` output rows.
    pub(crate) fn fill_incomplete(
        &self,
        dst: &mut [u8],
        stride: usize,
        rows_decoded: usize,
        bottom_up: bool,
    ) {
        let height = self.height();
        let missing = height.saturating_sub(rows_decoded);
        if missing == 0 {
            return;
        }
        let first = if bottom_up { 0 } else { height - missing };
        let Some(start) = first.checked_mul(stride) else {
            return;
        };
        if start >= dst.len() {
            return;
        }
        fill(
            &mut dst[start..],
            stride,
            self.width(),
            missing,
            self.fill_value(),
            self.zero_initialized,
        );
    }
}

/// Value written to pixels no source data reached: index 0 for index
/// output, opaque black for opaque output, transparent otherwise.
pub(crate) fn fill_value(layout: PixelLayout, alpha: AlphaMode) -> &'static [u8] {
    match (layout, alpha) {
        (PixelLayout::Index8, _) => &[0],
        (_, AlphaMode::Opaque) => &[0, 0, 0, 0xff],
        _ => &[0, 0, 0, 0],
    }
}

// ── Format dispatch ─────────────────────────────────────────────────

/// A decoder for any supported format, chosen by signature.
#[non_exhaustive]
pub enum Codec {
    #[cfg(feature = "bmp")]
    Bmp(BmpDecoder),
    #[cfg(feature = "ico")]
    Ico(IcoDecoder),
    #[cfg(feature = "gif")]
    Gif(GifDecoder),
}

/// Sniff `data` and open the matching decoder.
pub fn open(data: &[u8], limits: Option<&Limits>) -> Result<Codec, CodecError> {
    match ImageFormat::detect(data) {
        #[cfg(feature = "bmp")]
        Some(ImageFormat::Bmp) => Ok(Codec::Bmp(BmpDecoder::new(data, limits)?)),
        #[cfg(feature = "ico")]
        Some(ImageFormat::Ico) => Ok(Codec::Ico(IcoDecoder::new(data, limits)?)),
        #[cfg(feature = "gif")]
        Some(ImageFormat::Gif) => Ok(Codec::Gif(GifDecoder::new(data, limits)?)),
        #[allow(unreachable_patterns)]
        Some(other) => Err(CodecError::unimplemented(alloc::format!(
            "{other:?} support is not compiled in"
        ))),
        None => Err(CodecError::UnrecognizedFormat),
    }
}

impl Codec {
    pub fn info(&self) -> ImageInfo {
        match self {
            #[cfg(feature = "bmp")]
            Self::Bmp(d) => d.info(),
            #[cfg(feature = "ico")]
            Self::Ico(d) => d.info(),
            #[cfg(feature = "gif")]
            Self::Gif(d) => d.info(),
        }
    }

    /// Append bytes that arrived after the codec was opened.
    pub fn push(&mut self, bytes: &[u8]) {
        match self {
            #[cfg(feature = "bmp")]
            Self::Bmp(d) => d.push(bytes),
            #[cfg(feature = "ico")]
            Self::Ico(d) => d.push(bytes),
            #[cfg(feature = "gif")]
            Self::Gif(d) => d.push(bytes),
        }
    }

    /// Begin decoding the image (the first frame, for GIF).
    pub fn start_decode(&mut self, opts: &DecodeOptions) -> Result<(), CodecError> {
        match self {
            #[cfg(feature = "bmp")]
            Self::Bmp(d) => d.start_decode(opts),
            #[cfg(feature = "ico")]
            Self::Ico(d) => d.start_decode(opts),
            #[cfg(feature = "gif")]
            Self::Gif(d) => d.start_frame(opts, FrameOptions::default()),
        }
    }

    /// Decode as far as the input allows. Call again after [`Codec::push`]
    /// when this returns [`CodecError::IncompleteInput`].
    pub fn incremental_decode(
        &mut self,
        dst: &mut [u8],
        stride: usize,
        stop: &dyn Stop,
    ) -> Result<usize, CodecError> {
        match self {
            #[cfg(feature = "bmp")]
            Self::Bmp(d) => d.incremental_decode(dst, stride, stop),
            #[cfg(feature = "ico")]
            Self::Ico(d) => d.incremental_decode(dst, stride, stop),
            #[cfg(feature = "gif")]
            Self::Gif(d) => d.incremental_decode(dst, stride, stop),
        }
    }

    /// Start and run a decode. Returns the number of rows written.
    pub fn decode(
        &mut self,
        dst: &mut [u8],
        stride: usize,
        opts: &DecodeOptions,
        stop: &dyn Stop,
    ) -> Result<usize, CodecError> {
        self.start_decode(opts)?;
        self.incremental_decode(dst, stride, stop)
    }

    /// Fill rows a partial decode left untouched.
    pub fn fill_incomplete(
        &self,
        dst: &mut [u8],
        stride: usize,
        opts: &DecodeOptions,
        rows_decoded: usize,
    ) -> Result<(), CodecError> {
        match self {
            #[cfg(feature = "bmp")]
            Self::Bmp(d) => d.fill_incomplete(dst, stride, opts, rows_decoded),
            #[cfg(feature = "ico")]
            Self::Ico(d) => d.fill_incomplete(dst, stride, opts, rows_decoded),
            #[cfg(feature = "gif")]
            Self::Gif(d) => d.fill_incomplete(dst, stride, opts, rows_decoded),
        }
    }

    /// Color table for index output, when the image has one.
    pub fn color_table(&self) -> Option<&ColorTable> {
        match self {
            #[cfg(feature = "bmp")]
            Self::Bmp(d) => d.color_table(),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

// ── One-call decoding ───────────────────────────────────────────────

/// Decoded pixels and how far decoding got.
#[derive(Clone, Debug)]
pub struct DecodeOutput {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub alpha: AlphaMode,
    /// [`Status::Success`], or the partial status when rows are missing.
    /// Missing rows hold the fill value.
    pub status: Status,
    pub rows_decoded: usize,
    /// Palette for [`PixelLayout::Index8`] output.
    pub color_table: Option<ColorTable>,
}

impl DecodeOutput {
    /// Access the pixel data, tightly packed.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    pub fn stride(&self) -> usize {
        self.layout.min_row_bytes(self.width)
    }

    /// Reinterpret pixel data as a typed pixel slice.
    ///
    /// Returns [`CodecError::InvalidConversion`] if the pixel layout doesn't match `P`.
    #[cfg(feature = "rgb")]
    pub fn as_pixels<P: crate::DecodePixel>(&self) -> Result<&[P], CodecError>
    where
        [u8]: rgb::AsPixels<P>,
    {
        if self.layout != P::layout() {
            return Err(CodecError::conversion(alloc::format!(
                "pixels are {:?}, not {:?}",
                self.layout,
                P::layout()
            )));
        }
        Ok(self.pixels().as_pixels())
    }

    /// Zero-copy view as an [`imgref::ImgRef`] of typed pixels.
    #[cfg(feature = "imgref")]
    pub fn as_imgref<P: crate::DecodePixel>(&self) -> Result<imgref::ImgRef<'_, P>, CodecError>
    where
        [u8]: rgb::AsPixels<P>,
    {
        let pixels: &[P] = self.as_pixels()?;
        Ok(imgref::ImgRef::new(
            pixels,
            self.width as usize,
            self.height as usize,
        ))
    }

    /// Convert to an [`imgref::ImgVec`] of typed pixels.
    #[cfg(feature = "imgref")]
    pub fn to_imgvec<P: crate::DecodePixel>(&self) -> Result<imgref::ImgVec<P>, CodecError>
    where
        [u8]: rgb::AsPixels<P>,
    {
        let pixels: &[P] = self.as_pixels()?;
        Ok(imgref::ImgVec::new(
            pixels.to_vec(),
            self.width as usize,
            self.height as usize,
        ))
    }
}

/// Builder for decoding a complete buffer in one call.
///
/// Truncated or corrupt images still produce output when any rows could be
/// decoded: the returned [`DecodeOutput::status`] reports the partial
/// result and the remaining rows hold the fill value.
#[derive(Clone, Debug)]
pub struct DecodeRequest<'a> {
    data: &'a [u8],
    options: DecodeOptions,
    limits: Option<&'a Limits>,
    frame: usize,
}

impl<'a> DecodeRequest<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            options: DecodeOptions::default(),
            limits: None,
            frame: 0,
        }
    }

    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_limits(mut self, limits: &'a Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Frame to decode from an animated GIF. Other formats only have frame 0.
    pub fn with_frame(mut self, index: usize) -> Self {
        self.frame = index;
        self
    }

    pub fn decode(&self, stop: impl Stop) -> Result<DecodeOutput, CodecError> {
        let mut codec = open(self.data, self.limits)?;
        let info = codec.info();
        let target = Target::new(&self.options, &info)?;
        let stride = target.row_bytes();
        let bytes = stride
            .checked_mul(target.height())
            .ok_or(CodecError::DimensionsTooLarge {
                width: info.width,
                height: info.height,
            })?;
        if let Some(limits) = self.limits {
            limits.check_memory(bytes)?;
        }
        stop.check()?;

        let mut pixels = vec![0u8; bytes];
        let opts = self.options.with_zero_initialized(true);
        let result = match (&mut codec, self.frame) {
            #[cfg(feature = "gif")]
            (Codec::Gif(gif), index) => gif.decode_frame(
                &mut pixels,
                stride,
                &opts,
                FrameOptions {
                    index,
                    prior_frame_composited: false,
                },
                &stop,
            ),
            (codec, 0) => codec.decode(&mut pixels, stride, &opts, &stop),
            (_, index) => Err(CodecError::invalid(alloc::format!(
                "{:?} images have no frame {index}",
                info.format
            ))),
        };
        let (status, rows_decoded) = match result {
            Ok(rows) => (Status::Success, rows),
            Err(e) => match e.rows_decoded() {
                Some(rows) => {
                    log::debug!("partial decode: {e}");
                    codec.fill_incomplete(&mut pixels, stride, &opts, rows)?;
                    (e.status(), rows)
                }
                None => return Err(e),
            },
        };

        Ok(DecodeOutput {
            pixels,
            width: target.width() as u32,
            height: target.height() as u32,
            layout: target.layout,
            alpha: target.alpha,
            status,
            rows_decoded,
            color_table: match target.layout {
                PixelLayout::Index8 => codec.color_table().cloned(),
                _ => None,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(w: u32, h: u32, layout: PixelLayout, alpha: AlphaMode) -> ImageInfo {
        ImageInfo {
            width: w,
            height: h,
            layout,
            alpha,
            format: ImageFormat::Bmp,
        }
    }

    #[test]
    fn fill_values() {
        assert_eq!(fill_value(PixelLayout::Index8, AlphaMode::Opaque), &[0]);
        assert_eq!(
            fill_value(PixelLayout::Bgra8, AlphaMode::Opaque),
            &[0, 0, 0, 255]
        );
        assert_eq!(
            fill_value(PixelLayout::Rgba8, AlphaMode::Premultiplied),
            &[0, 0, 0, 0]
        );
    }

    #[test]
    fn target_rejects_impossible_conversions() {
        let src = info(4, 4, PixelLayout::Rgba8, AlphaMode::Unpremultiplied);
        let opts = DecodeOptions::new(PixelLayout::Rgba8).with_alpha(AlphaMode::Opaque);
        assert!(matches!(
            Target::new(&opts, &src),
            Err(CodecError::InvalidConversion(_))
        ));
        let opts = DecodeOptions::new(PixelLayout::Index8);
        assert!(Target::new(&opts, &src).is_err());
        let opts = DecodeOptions::default().with_sample_size(0);
        assert!(Target::new(&opts, &src).is_err());
    }

    #[test]
    fn packing_follows_output_and_source() {
        let premul = DecodeOptions::new(PixelLayout::Bgra8).with_alpha(AlphaMode::Premultiplied);
        let src = info(2, 2, PixelLayout::Rgba8, AlphaMode::Unpremultiplied);
        let pack = Target::new(&premul, &src).unwrap().pack();
        assert!(pack.bgra && pack.premultiply);
        assert_eq!(pack.pack(200, 100, 50, 128), [25, 50, 100, 128]);

        // Opaque sources never need premultiplying.
        let src = info(2, 2, PixelLayout::Rgba8, AlphaMode::Opaque);
        let pack = Target::new(&premul, &src).unwrap().pack();
        assert!(pack.bgra && !pack.premultiply);

        let pack = Target::new(&DecodeOptions::default(), &src).unwrap().pack();
        assert!(!pack.bgra && !pack.premultiply);
    }

    #[test]
    fn incomplete_fill_respects_row_order() {
        let src = info(1, 3, PixelLayout::Rgba8, AlphaMode::Opaque);
        let opts = DecodeOptions::new(PixelLayout::Rgba8).with_alpha(AlphaMode::Opaque);
        let target = Target::new(&opts, &src).unwrap();

        let mut dst = [7u8; 12];
        target.fill_incomplete(&mut dst, 4, 1, false);
        assert_eq!(dst, [7, 7, 7, 7, 0, 0, 0, 255, 0, 0, 0, 255]);

        let mut dst = [7u8; 12];
        target.fill_incomplete(&mut dst, 4, 1, true);
        assert_eq!(dst, [0, 0, 0, 255, 0, 0, 0, 255, 7, 7, 7, 7]);

        let mut dst = [7u8; 12];
        target.fill_incomplete(&mut dst, 4, 3, true);
        assert_eq!(dst, [7; 12]);
    }

    #[test]
    fn unknown_signature() {
        assert!(matches!(
            DecodeRequest::new(b"not an image").decode(enough::Unstoppable),
            Err(CodecError::UnrecognizedFormat)
        ));
    }
}
