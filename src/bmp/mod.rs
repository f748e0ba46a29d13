//! BMP decoding: standard, bit-mask and RLE pixel data.
//!
//! [`BmpDecoder`] parses the headers when it is opened and keeps every byte
//! pushed to it, so a decode that ran out of input can be resumed with
//! [`BmpDecoder::incremental_decode`] after more bytes arrive.

mod header;
mod mask;
mod rle;
mod standard;

pub use header::HeaderType;

use enough::Stop;

use crate::color::ColorTable;
use crate::decode::{DecodeOptions, Target};
use crate::error::CodecError;
use crate::info::{ImageFormat, ImageInfo};
use crate::limits::{Limits, check_optional};
use crate::stream::SourceBuffer;
use crate::swizzle::masks::BitMaskSet;
use header::{BmpHeader, RowOrder, Variant};
use mask::MaskDecoder;
use rle::RleDecoder;
use standard::StandardDecoder;

enum PixelDecoder {
    Standard(StandardDecoder),
    Mask(MaskDecoder),
    Rle(RleDecoder),
}

impl PixelDecoder {
    fn target(&self) -> &Target {
        match self {
            Self::Standard(d) => d.target(),
            Self::Mask(d) => d.target(),
            Self::Rle(d) => d.target(),
        }
    }
}

/// Streaming BMP decoder, also used for images embedded in ICO files.
pub struct BmpDecoder {
    source: SourceBuffer,
    header: BmpHeader,
    masks: Option<BitMaskSet>,
    info: ImageInfo,
    active: Option<PixelDecoder>,
}

impl BmpDecoder {
    /// Parse the headers at the start of `data`.
    ///
    /// The headers and color table must be complete; pixel data may still be
    /// missing and can be supplied later through [`BmpDecoder::push`].
    pub fn new(data: &[u8], limits: Option<&Limits>) -> Result<Self, CodecError> {
        Self::open(data, false, limits)
    }

    /// Parse a BMP stored inside an ICO entry (no file header, doubled height).
    pub(crate) fn new_in_ico(data: &[u8], limits: Option<&Limits>) -> Result<Self, CodecError> {
        Self::open(data, true, limits)
    }

    fn open(data: &[u8], in_ico: bool, limits: Option<&Limits>) -> Result<Self, CodecError> {
        let header = header::read_header(data, in_ico)?;
        check_optional(limits, header.width, header.height)?;
        let masks = match header.variant {
            Variant::BitMask(masks) => Some(BitMaskSet::new(masks, header.bits_per_pixel)?),
            _ => None,
        };
        let info = ImageInfo {
            width: header.width,
            height: header.height,
            layout: header.layout,
            alpha: header.alpha,
            format: if in_ico {
                ImageFormat::Ico
            } else {
                ImageFormat::Bmp
            },
        };
        Ok(Self {
            source: SourceBuffer::new(data),
            header,
            masks,
            info,
            active: None,
        })
    }

    pub fn info(&self) -> ImageInfo {
        self.info
    }

    pub fn header_type(&self) -> HeaderType {
        self.header.header_type
    }

    /// Bits per pixel after any RLE correction.
    pub fn bits_per_pixel(&self) -> u16 {
        self.header.bits_per_pixel
    }

    /// Channel masks of a bit-field image.
    pub fn bit_masks(&self) -> Option<&BitMaskSet> {
        self.masks.as_ref()
    }

    /// The palette in unpremultiplied RGBA, for images with 8 or fewer bits
    /// per pixel. Index output refers to these entries.
    pub fn color_table(&self) -> Option<&ColorTable> {
        self.header.color_table.as_ref()
    }

    /// Append bytes that arrived after the decoder was opened.
    pub fn push(&mut self, bytes: &[u8]) {
        self.source.push(bytes);
    }

    /// Validate `opts` and reset decoding to the first row.
    pub fn start_decode(&mut self, opts: &DecodeOptions) -> Result<(), CodecError> {
        let target = Target::new(opts, &self.info)?;
        let decoder = match (self.header.variant, self.masks) {
            (Variant::Standard, _) => {
                PixelDecoder::Standard(StandardDecoder::new(&self.header, target)?)
            }
            (Variant::BitMask(_), Some(masks)) => {
                PixelDecoder::Mask(MaskDecoder::new(&self.header, masks, target)?)
            }
            (Variant::Rle, _) => PixelDecoder::Rle(RleDecoder::new(&self.header, target)),
            (Variant::BitMask(_), None) => {
                return Err(CodecError::invalid("bit-mask image without masks"));
            }
        };
        self.active = Some(decoder);
        Ok(())
    }

    /// Decode as many rows as the input allows into `dst`.
    ///
    /// Returns the number of output rows on success. When the input runs
    /// out, returns [`CodecError::IncompleteInput`] with the rows written so
    /// far; push more bytes and call again with the same buffer to resume.
    pub fn incremental_decode(
        &mut self,
        dst: &mut [u8],
        stride: usize,
        stop: &dyn Stop,
    ) -> Result<usize, CodecError> {
        let Some(active) = self.active.as_mut() else {
            return Err(CodecError::invalid("incremental_decode called before start_decode"));
        };
        active.target().check_buffer(dst, stride)?;
        match active {
            PixelDecoder::Standard(d) => d.decode_rows(&self.header, &self.source, dst, stride, stop),
            PixelDecoder::Mask(d) => d.decode_rows(&self.header, &self.source, dst, stride, stop),
            PixelDecoder::Rle(d) => d.decode_rows(&self.header, &self.source, dst, stride, stop),
        }
    }

    /// [`BmpDecoder::start_decode`] followed by [`BmpDecoder::incremental_decode`].
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

    /// Fill the rows a partial decode did not reach with the fill value.
    pub fn fill_incomplete(
        &self,
        dst: &mut [u8],
        stride: usize,
        opts: &DecodeOptions,
        rows_decoded: usize,
    ) -> Result<(), CodecError> {
        let target = Target::new(opts, &self.info)?;
        target.check_buffer(dst, stride)?;
        target.fill_incomplete(
            dst,
            stride,
            rows_decoded,
            self.header.row_order == RowOrder::BottomUp,
        );
        Ok(())
    }
}
