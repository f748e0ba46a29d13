//! Uncompressed palette and truecolor rows, plus the ICO AND mask.

use alloc::rc::Rc;

use enough::Stop;

use super::header::BmpHeader;
use crate::decode::Target;
use crate::error::CodecError;
use crate::stream::SourceBuffer;
use crate::swizzle::{SrcFormat, Swizzler};

pub(crate) struct StandardDecoder {
    target: Target,
    swizzler: Swizzler,
    src_row_bytes: usize,
    next_row: usize,
    pending_and_mask: bool,
}

impl StandardDecoder {
    pub(crate) fn new(header: &BmpHeader, target: Target) -> Result<Self, CodecError> {
        let src = match header.bits_per_pixel {
            bits @ (1 | 2 | 4 | 8) => SrcFormat::Index { bits: bits as u8 },
            24 => SrcFormat::Bgr,
            32 if header.alpha.is_opaque() => SrcFormat::Bgrx,
            32 => SrcFormat::Bgra,
            other => {
                return Err(CodecError::invalid(alloc::format!(
                    "no standard decoder for {other}-bit pixels"
                )));
            }
        };
        let pack = target.pack();
        let table = header
            .color_table
            .as_ref()
            .map(|table| Rc::new(table.repacked(pack)));
        let width = header.width as usize;
        let swizzler = Swizzler::new(
            src,
            target.layout,
            pack,
            table,
            width,
            width,
            0,
            target.sampler.sample_x,
        )?;
        Ok(Self {
            target,
            swizzler,
            src_row_bytes: header.src_row_bytes(),
            next_row: 0,
            pending_and_mask: header.in_ico && header.bits_per_pixel < 32,
        })
    }

    pub(crate) fn target(&self) -> &Target {
        &self.target
    }

    /// Decode rows until the output is complete or the input runs out.
    pub(crate) fn decode_rows(
        &mut self,
        header: &BmpHeader,
        source: &SourceBuffer,
        dst: &mut [u8],
        stride: usize,
        stop: &dyn Stop,
    ) -> Result<usize, CodecError> {
        let height = self.target.height();
        let row_len = self.target.row_bytes();
        while self.next_row < height {
            if self.next_row % 16 == 0 {
                stop.check()?;
            }
            let src_y = self.target.sampler.src_row(self.next_row);
            let pos = header.pixel_offset + src_y * self.src_row_bytes;
            let Some(row) = source.get(pos, self.src_row_bytes) else {
                return Err(CodecError::IncompleteInput {
                    rows_decoded: self.next_row,
                });
            };
            let y = header.dst_row(self.next_row, height);
            self.swizzler
                .swizzle(&mut dst[y * stride..y * stride + row_len], row);
            self.next_row += 1;
        }
        if self.pending_and_mask {
            self.apply_and_mask(header, source, dst, stride);
            self.pending_and_mask = false;
        }
        Ok(height)
    }

    /// Clear every pixel whose AND-mask bit is set.
    ///
    /// The mask is optional: rows missing from the input leave the color
    /// data as decoded.
    fn apply_and_mask(
        &self,
        header: &BmpHeader,
        source: &SourceBuffer,
        dst: &mut [u8],
        stride: usize,
    ) {
        let mask_row_bytes = (header.width as usize).div_ceil(32) * 4;
        let mask_start = header.pixel_offset + header.height as usize * self.src_row_bytes;
        let height = self.target.height();
        let bpp = self.target.layout.bytes_per_pixel();
        for k in 0..height {
            let src_y = self.target.sampler.src_row(k);
            let pos = mask_start.saturating_add(src_y * mask_row_bytes);
            let Some(mask) = source.get(pos, mask_row_bytes) else {
                log::debug!("ico AND mask ends after {k} rows");
                return;
            };
            let y = header.dst_row(k, height);
            let row = &mut dst[y * stride..y * stride + self.target.row_bytes()];
            for (c, px) in row.chunks_exact_mut(bpp).enumerate() {
                let x = self.target.sampler.src_col(c);
                if (mask[x / 8] >> (7 - x % 8)) & 1 == 1 {
                    px.fill(0);
                }
            }
        }
    }
}
