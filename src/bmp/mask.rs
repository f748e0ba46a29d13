//! Bit-field (16, 24 and 32-bit masked) rows.

use enough::Stop;

use super::header::BmpHeader;
use crate::decode::Target;
use crate::error::CodecError;
use crate::pixel::PixelLayout;
use crate::stream::SourceBuffer;
use crate::swizzle::mask_swizzler::MaskSwizzler;
use crate::swizzle::masks::BitMaskSet;

pub(crate) struct MaskDecoder {
    target: Target,
    swizzler: MaskSwizzler,
    has_alpha_mask: bool,
    src_row_bytes: usize,
    next_row: usize,
    /// Some decoded pixel had nonzero alpha.
    seen_alpha: bool,
}

impl MaskDecoder {
    pub(crate) fn new(
        header: &BmpHeader,
        masks: BitMaskSet,
        target: Target,
    ) -> Result<Self, CodecError> {
        let swizzler = MaskSwizzler::new(
            masks,
            header.bits_per_pixel,
            target.layout,
            target.alpha,
            header.width as usize,
            target.sampler.sample_x,
        )?;
        Ok(Self {
            target,
            swizzler,
            has_alpha_mask: masks.has_alpha() && !target.alpha.is_opaque(),
            src_row_bytes: header.src_row_bytes(),
            next_row: 0,
            seen_alpha: false,
        })
    }

    pub(crate) fn target(&self) -> &Target {
        &self.target
    }

    pub(crate) fn decode_rows(
        &mut self,
        header: &BmpHeader,
        source: &SourceBuffer,
        dst: &mut [u8],
        stride: usize,
        stop: &dyn Stop,
    ) -> Result<usize, CodecError> {
        let height = self.target.height();
        while self.next_row < height {
            if self.next_row % 16 == 0 {
                stop.check()?;
            }
            let Some(row) = self.src_row(header, source, self.next_row) else {
                return Err(CodecError::IncompleteInput {
                    rows_decoded: self.next_row,
                });
            };
            let out = self.dst_row(header, dst, stride, self.next_row);
            self.seen_alpha |= self.swizzler.swizzle(out, row);
            self.next_row += 1;
        }

        if self.has_alpha_mask && !self.seen_alpha {
            // An alpha mask that leaves every pixel transparent is treated as
            // unused: decode again from the retained rows, fully opaque.
            log::debug!("bmp alpha mask is zero everywhere, decoding as opaque");
            let opaque = self
                .swizzler
                .opaque(header.bits_per_pixel, self.target.layout == PixelLayout::Bgra8);
            for k in 0..height {
                if let Some(row) = self.src_row(header, source, k) {
                    opaque.swizzle(self.dst_row(header, dst, stride, k), row);
                }
            }
            self.seen_alpha = true;
        }
        Ok(height)
    }

    fn src_row<'s>(&self, header: &BmpHeader, source: &'s SourceBuffer, k: usize) -> Option<&'s [u8]> {
        let src_y = self.target.sampler.src_row(k);
        source.get(
            header.pixel_offset + src_y * self.src_row_bytes,
            self.src_row_bytes,
        )
    }

    fn dst_row<'d>(
        &self,
        header: &BmpHeader,
        dst: &'d mut [u8],
        stride: usize,
        k: usize,
    ) -> &'d mut [u8] {
        let y = header.dst_row(k, self.target.height());
        &mut dst[y * stride..y * stride + self.target.row_bytes()]
    }
}
