//! BMP and BMP-in-ICO header parsing.
//!
//! The header is read atomically when the decoder is opened: a header that
//! does not fit in the bytes seen so far is rejected rather than waited on.
//! Parsing produces a [`BmpHeader`] carrying every decision the pixel
//! decoders need (variant, bit depth, row order, alpha, color table and the
//! absolute position of the pixel data).

use crate::bytes::{i32_le, u16_le, u32_le};
use crate::color::ColorTable;
use crate::error::CodecError;
use crate::pixel::{AlphaMode, PixelLayout};
use crate::stream::Cursor;
use crate::swizzle::masks::InputMasks;

const FILE_HEADER_BYTES: usize = 14;
const OS2_V1_BYTES: u32 = 12;
const INFO_BASE_BYTES: u32 = 16;

// ── Header type ─────────────────────────────────────────────────────

/// Info-header shape, selected by the header's declared length.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HeaderType {
    V1,
    V2,
    V3,
    V4,
    V5,
    Os2V1,
    Os2VX,
    /// A length no known header has. Parsed with the common V1 fields.
    Unknown,
}

impl HeaderType {
    fn from_size(size: u32) -> Self {
        match size {
            40 => Self::V1,
            52 => Self::V2,
            56 => Self::V3,
            108 => Self::V4,
            124 => Self::V5,
            16 | 20 | 24 | 28 | 32 | 36 | 42 | 44 | 46 | 48 | 60 | 64 => Self::Os2VX,
            OS2_V1_BYTES..INFO_BASE_BYTES => Self::Os2V1,
            other => {
                log::warn!("unknown bmp header size {other}, reading common fields");
                Self::Unknown
            }
        }
    }

    /// Whether the alpha mask at offset 52 is honoured.
    fn reads_alpha_mask(self, in_ico: bool) -> bool {
        matches!(self, Self::V4 | Self::V5) || (self == Self::V3 && in_ico)
    }
}

// ── Decisions ───────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RowOrder {
    TopDown,
    BottomUp,
}

/// Which pixel decoder handles the image data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Variant {
    Standard,
    BitMask(InputMasks),
    Rle,
}

#[derive(Clone, Debug)]
pub(crate) struct BmpHeader {
    pub header_type: HeaderType,
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u16,
    pub row_order: RowOrder,
    pub variant: Variant,
    pub alpha: AlphaMode,
    pub layout: PixelLayout,
    pub in_ico: bool,
    /// Unpremultiplied RGBA entries, padded to `1 << bits_per_pixel`.
    pub color_table: Option<ColorTable>,
    /// Position of the first pixel byte.
    pub pixel_offset: usize,
    /// Position one past the last pixel byte, when the file declares it.
    pub data_end: Option<usize>,
    /// Encoded bytes per row, padded to four bytes.
    pub row_bytes: usize,
}

impl BmpHeader {
    pub(crate) fn src_row_bytes(&self) -> usize {
        self.row_bytes
    }

    /// Destination row for source row `y` of `height` rows.
    pub(crate) fn dst_row(&self, y: usize, height: usize) -> usize {
        match self.row_order {
            RowOrder::TopDown => y,
            RowOrder::BottomUp => height - 1 - y,
        }
    }
}

// ── Parsing ─────────────────────────────────────────────────────────

/// Parse the headers and color table at the start of `data`.
///
/// With `in_ico`, the 14-byte file header is absent, the height covers
/// both the color and AND masks, and pixel data follows the color table.
pub(crate) fn read_header(data: &[u8], in_ico: bool) -> Result<BmpHeader, CodecError> {
    let mut cursor = Cursor::new(data);

    let (total_bytes, offset) = if in_ico {
        (None, 0)
    } else {
        let file = cursor.read_bytes(FILE_HEADER_BYTES, "bmp file header")?;
        if &file[..2] != b"BM" {
            return Err(CodecError::UnrecognizedFormat);
        }
        let total = u32_le(file, 2).unwrap_or(0) as usize;
        let offset = u32_le(file, 10).unwrap_or(0) as usize;
        (Some(total), offset)
    };

    let info_size = cursor.read_u32_le("bmp info header size")?;
    if info_size < OS2_V1_BYTES {
        return Err(CodecError::invalid(alloc::format!(
            "bmp info header size {info_size} is too small"
        )));
    }
    cursor.read_bytes(info_size as usize - 4, "bmp info header")?;
    let info_start = cursor.position() - info_size as usize;
    let info = &data[info_start..cursor.position()];

    let header_type = HeaderType::from_size(info_size);
    let field = |v: Option<u32>| v.unwrap_or(0);

    let (raw_width, raw_height, mut bits_per_pixel, compression, num_colors, bytes_per_color) =
        if header_type == HeaderType::Os2V1 {
            (
                i32::from(u16_le(info, 4).unwrap_or(0)),
                i32::from(u16_le(info, 6).unwrap_or(0)),
                u16_le(info, 10).unwrap_or(0),
                0,
                0,
                3,
            )
        } else {
            (
                i32_le(info, 4).unwrap_or(0),
                i32_le(info, 8).unwrap_or(0),
                u16_le(info, 14).unwrap_or(0),
                if info_size >= 20 { field(u32_le(info, 16)) } else { 0 },
                if info_size >= 36 { field(u32_le(info, 32)) } else { 0 },
                4,
            )
        };

    let mut height = i64::from(raw_height);
    if in_ico {
        height /= 2;
    }
    let row_order = if height < 0 {
        height = -height;
        RowOrder::TopDown
    } else {
        RowOrder::BottomUp
    };
    if raw_width <= 0 || height <= 0 {
        return Err(CodecError::invalid(alloc::format!(
            "invalid bmp dimensions {raw_width}x{height}"
        )));
    }
    let width = raw_width as u32;
    let height = height as u32;

    let mut mask_bytes = 0usize;
    let mut variant = match compression {
        0 => Variant::Standard,
        1 => {
            if bits_per_pixel != 8 {
                log::warn!("correcting {bits_per_pixel}-bit rle8 image to 8 bits");
                bits_per_pixel = 8;
            }
            Variant::Rle
        }
        2 => {
            if bits_per_pixel != 4 {
                log::warn!("correcting {bits_per_pixel}-bit rle4 image to 4 bits");
                bits_per_pixel = 4;
            }
            Variant::Rle
        }
        3 | 6 => {
            let mut masks = match header_type {
                HeaderType::V1 => {
                    let m = cursor.read_bytes(12, "bmp bit masks")?;
                    mask_bytes = 12;
                    InputMasks {
                        red: field(u32_le(m, 0)),
                        green: field(u32_le(m, 4)),
                        blue: field(u32_le(m, 8)),
                        alpha: 0,
                    }
                }
                HeaderType::V2 | HeaderType::V3 | HeaderType::V4 | HeaderType::V5 => InputMasks {
                    red: field(u32_le(info, 40)),
                    green: field(u32_le(info, 44)),
                    blue: field(u32_le(info, 48)),
                    alpha: 0,
                },
                HeaderType::Os2VX => {
                    return Err(CodecError::unimplemented("os/2 bit-mask bmp"));
                }
                _ => {
                    return Err(CodecError::invalid("bit masks in an unsupported bmp header"));
                }
            };
            if header_type.reads_alpha_mask(in_ico) {
                masks.alpha = field(u32_le(info, 52));
            }
            Variant::BitMask(masks)
        }
        4 if bits_per_pixel == 24 => Variant::Rle,
        4 => return Err(CodecError::unimplemented("jpeg-compressed bmp")),
        5 => return Err(CodecError::unimplemented("png-compressed bmp")),
        11..=13 => return Err(CodecError::unimplemented("cmyk bmp")),
        other => {
            return Err(CodecError::invalid(alloc::format!(
                "unknown bmp compression {other}"
            )));
        }
    };

    let mut alpha = AlphaMode::Opaque;
    if header_type.reads_alpha_mask(in_ico) && field(u32_le(info, 52)) != 0 {
        alpha = AlphaMode::Unpremultiplied;
    }

    let mut layout = PixelLayout::Rgba8;
    match bits_per_pixel {
        16 => {
            if !matches!(variant, Variant::BitMask(_)) {
                variant = Variant::BitMask(InputMasks {
                    red: 0x7c00,
                    green: 0x03e0,
                    blue: 0x001f,
                    alpha: 0,
                });
            }
        }
        1 | 2 | 4 | 8 => {
            if matches!(variant, Variant::BitMask(_)) {
                return Err(CodecError::invalid(alloc::format!(
                    "bit masks require 16, 24 or 32 bits per pixel, not {bits_per_pixel}"
                )));
            }
            // Index output cannot represent pixels left transparent by rle
            // skips or an ico AND mask.
            if variant != Variant::Rle && !in_ico {
                layout = PixelLayout::Index8;
            }
        }
        24 | 32 => {}
        other => {
            return Err(CodecError::invalid(alloc::format!(
                "invalid bmp bit depth {other}"
            )));
        }
    }

    // Rle skips leave pixels transparent; ico images carry either a real
    // alpha channel (32 bits) or an AND mask.
    if in_ico || variant == Variant::Rle {
        alpha = AlphaMode::Unpremultiplied;
    }

    let header_end = if in_ico { 0 } else { FILE_HEADER_BYTES } + info_size as usize + mask_bytes;
    let data_end = match (variant, total_bytes) {
        (Variant::BitMask(_), _) if in_ico => {
            return Err(CodecError::invalid("ico images may not use bit masks"));
        }
        (Variant::Rle, Some(total)) => {
            if total <= offset {
                return Err(CodecError::invalid(
                    "rle bmp declares no bytes after the pixel offset",
                ));
            }
            Some(total)
        }
        _ => None,
    };
    if !in_ico && offset < header_end {
        return Err(CodecError::invalid(alloc::format!(
            "bmp pixel offset {offset} lies inside the {header_end}-byte header"
        )));
    }

    let mut color_table = None;
    let mut color_bytes = 0;
    if bits_per_pixel <= 8 {
        let max_colors = 1u32 << bits_per_pixel;
        let count = if num_colors == 0 || num_colors > max_colors {
            max_colors
        } else {
            num_colors
        } as usize;
        color_bytes = count * bytes_per_color;
        let raw = cursor.read_bytes(color_bytes, "bmp color table")?;
        let mut table = ColorTable::new();
        for entry in raw.chunks_exact(bytes_per_color) {
            table.push([entry[2], entry[1], entry[0], 0xff]);
        }
        table.pad_to(max_colors as usize, [0, 0, 0, 0xff]);
        color_table = Some(table);
    }

    let pixel_offset = if in_ico {
        header_end + color_bytes
    } else {
        if offset < header_end + color_bytes {
            return Err(CodecError::invalid(alloc::format!(
                "bmp pixel offset {offset} lies inside the color table"
            )));
        }
        offset
    };

    // Row positions are computed in usize; the whole pixel area must fit.
    let row_bytes = u64::from(width)
        .checked_mul(u64::from(bits_per_pixel))
        .map(|bits| bits.div_ceil(32) * 4)
        .and_then(|bytes| usize::try_from(bytes).ok())
        .filter(|&bytes| {
            bytes
                .checked_mul(height as usize)
                .and_then(|area| area.checked_add(pixel_offset))
                .is_some()
        })
        .ok_or_else(|| {
            CodecError::invalid(alloc::format!(
                "bmp rows of {width} {bits_per_pixel}-bit pixels do not fit in memory"
            ))
        })?;

    log::debug!(
        "bmp {width}x{height} {bits_per_pixel}bpp {header_type:?} {variant:?} {row_order:?}"
    );

    Ok(BmpHeader {
        header_type,
        width,
        height,
        bits_per_pixel,
        row_order,
        variant,
        alpha,
        layout,
        in_ico,
        color_table,
        pixel_offset,
        data_end,
        row_bytes,
    })
}
