//! Byte builders for small BMP, ICO and GIF fixtures.

#![allow(dead_code)]

// ── BMP ──────────────────────────────────────────────────────────────

/// A 40-byte BITMAPINFOHEADER.
pub fn info_v1(width: i32, height: i32, bpp: u16, compression: u32, colors: u32) -> Vec<u8> {
    let mut v = Vec::with_capacity(40);
    v.extend_from_slice(&40u32.to_le_bytes());
    v.extend_from_slice(&width.to_le_bytes());
    v.extend_from_slice(&height.to_le_bytes());
    v.extend_from_slice(&1u16.to_le_bytes());
    v.extend_from_slice(&bpp.to_le_bytes());
    v.extend_from_slice(&compression.to_le_bytes());
    v.extend_from_slice(&0u32.to_le_bytes());
    v.extend_from_slice(&[0; 8]);
    v.extend_from_slice(&colors.to_le_bytes());
    v.extend_from_slice(&0u32.to_le_bytes());
    v
}

/// A 12-byte OS/2 BITMAPCOREHEADER.
pub fn info_os2(width: u16, height: u16, bpp: u16) -> Vec<u8> {
    let mut v = Vec::with_capacity(12);
    v.extend_from_slice(&12u32.to_le_bytes());
    v.extend_from_slice(&width.to_le_bytes());
    v.extend_from_slice(&height.to_le_bytes());
    v.extend_from_slice(&1u16.to_le_bytes());
    v.extend_from_slice(&bpp.to_le_bytes());
    v
}

/// File header + `info` + `extra` (bit masks and/or palette) + `pixels`.
pub fn bmp(info: &[u8], extra: &[u8], pixels: &[u8]) -> Vec<u8> {
    let offset = 14 + info.len() + extra.len();
    let mut v = Vec::with_capacity(offset + pixels.len());
    v.extend_from_slice(b"BM");
    v.extend_from_slice(&((offset + pixels.len()) as u32).to_le_bytes());
    v.extend_from_slice(&[0; 4]);
    v.extend_from_slice(&(offset as u32).to_le_bytes());
    v.extend_from_slice(info);
    v.extend_from_slice(extra);
    v.extend_from_slice(pixels);
    v
}

/// Pad each row of `rows` to a multiple of four bytes and concatenate.
pub fn padded_rows(rows: &[&[u8]]) -> Vec<u8> {
    let mut v = Vec::new();
    for row in rows {
        v.extend_from_slice(row);
        v.resize(v.len() + (4 - row.len() % 4) % 4, 0);
    }
    v
}

/// A top-down 24-bit image whose pixel at `(x, y)` is `color(x, y)` (RGB).
pub fn bmp24(width: usize, height: usize, color: impl Fn(usize, usize) -> [u8; 3]) -> Vec<u8> {
    let rows: Vec<Vec<u8>> = (0..height)
        .map(|y| {
            (0..width)
                .flat_map(|x| {
                    let [r, g, b] = color(x, y);
                    [b, g, r]
                })
                .collect()
        })
        .collect();
    let rows: Vec<&[u8]> = rows.iter().map(Vec::as_slice).collect();
    bmp(
        &info_v1(width as i32, -(height as i32), 24, 0, 0),
        &[],
        &padded_rows(&rows),
    )
}

/// A bottom-up RLE8 file with a two-entry palette: 0 red, 1 green.
pub fn rle8(width: i32, height: i32, tokens: &[u8]) -> Vec<u8> {
    let palette = [0, 0, 255, 0, 0, 255, 0, 0];
    bmp(&info_v1(width, height, 8, 1, 2), &palette, tokens)
}

/// 4x3 RLE8 image exercising runs, a delta, a literal and line ends.
///
/// Displayed top to bottom: a red row; a skipped pixel then red, green,
/// red; two green pixels then two skipped.
pub fn rle8_sample() -> Vec<u8> {
    rle8(
        4,
        3,
        &[
            2, 1, 0, 0, // bottom row: two green, end of line
            0, 2, 1, 0, // delta one column right
            0, 3, 0, 1, 0, 0, // literal red, green, red, padded
            0, 0, // end of line
            4, 0, // four red
            0, 1, // end of file
        ],
    )
}

// ── ICO ──────────────────────────────────────────────────────────────

/// A BMP-in-ICO image: info header with doubled height, then `body`.
pub fn ico_image(width: i32, height: i32, bpp: u16, body: &[u8]) -> Vec<u8> {
    let mut v = info_v1(width, height * 2, bpp, 0, 0);
    v.extend_from_slice(body);
    v
}

/// An ICO file whose directory lists `images` in `order`.
///
/// Image data is laid out in the order given by `images`; `order` only
/// permutes the directory entries.
pub fn ico(images: &[(u8, u8, Vec<u8>)], order: &[usize]) -> Vec<u8> {
    let mut offsets = Vec::new();
    let mut offset = 6 + 16 * images.len();
    for (_, _, data) in images {
        offsets.push(offset);
        offset += data.len();
    }
    let mut v = vec![0, 0, 1, 0];
    v.extend_from_slice(&(images.len() as u16).to_le_bytes());
    for &i in order {
        let (w, h, data) = &images[i];
        v.extend_from_slice(&[*w, *h, 0, 0]);
        v.extend_from_slice(&1u16.to_le_bytes());
        v.extend_from_slice(&32u16.to_le_bytes());
        v.extend_from_slice(&(data.len() as u32).to_le_bytes());
        v.extend_from_slice(&(offsets[i] as u32).to_le_bytes());
    }
    for (_, _, data) in images {
        v.extend_from_slice(data);
    }
    v
}

// ── GIF ──────────────────────────────────────────────────────────────

pub const BLACK: [u8; 4] = [0, 0, 0, 255];
pub const RED: [u8; 4] = [255, 0, 0, 255];
pub const GREEN: [u8; 4] = [0, 255, 0, 255];
pub const BLUE: [u8; 4] = [0, 0, 255, 255];
pub const CLEAR: [u8; 4] = [0, 0, 0, 0];

/// Black, red, green, blue.
pub const PALETTE: [[u8; 3]; 4] = [[0, 0, 0], [255, 0, 0], [0, 255, 0], [0, 0, 255]];

fn color_table_bits(colors: usize) -> u8 {
    (colors.max(2).next_power_of_two().trailing_zeros() - 1) as u8
}

fn push_colors(v: &mut Vec<u8>, colors: &[[u8; 3]]) {
    let padded = colors.len().max(2).next_power_of_two();
    for i in 0..padded {
        v.extend_from_slice(&colors.get(i).copied().unwrap_or([0; 3]));
    }
}

/// Frame placement for [`Gif::image`].
#[derive(Clone, Copy)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

pub fn rect(x: u16, y: u16, width: u16, height: u16) -> Rect {
    Rect {
        x,
        y,
        width,
        height,
    }
}

/// Builds a GIF89a stream block by block.
pub struct Gif {
    bytes: Vec<u8>,
}

impl Gif {
    pub fn new(width: u16, height: u16, global: Option<&[[u8; 3]]>) -> Self {
        let mut bytes = b"GIF89a".to_vec();
        bytes.extend_from_slice(&width.to_le_bytes());
        bytes.extend_from_slice(&height.to_le_bytes());
        match global {
            Some(colors) => {
                bytes.extend_from_slice(&[0x80 | color_table_bits(colors.len()), 0, 0]);
                push_colors(&mut bytes, colors);
            }
            None => bytes.extend_from_slice(&[0, 0, 0]),
        }
        Self { bytes }
    }

    /// Netscape looping extension; 0 loops forever.
    pub fn netscape(mut self, loops: u16) -> Self {
        self.bytes.extend_from_slice(&[0x21, 0xff, 11]);
        self.bytes.extend_from_slice(b"NETSCAPE2.0");
        self.bytes.extend_from_slice(&[3, 1]);
        self.bytes.extend_from_slice(&loops.to_le_bytes());
        self.bytes.push(0);
        self
    }

    pub fn comment(mut self, text: &[u8]) -> Self {
        self.bytes.extend_from_slice(&[0x21, 0xfe, text.len() as u8]);
        self.bytes.extend_from_slice(text);
        self.bytes.push(0);
        self
    }

    /// Graphic control extension with delay in hundredths of a second.
    pub fn control(mut self, disposal: u8, delay: u16, transparent: Option<u8>) -> Self {
        let flags = (disposal << 2) | u8::from(transparent.is_some());
        self.bytes.extend_from_slice(&[0x21, 0xf9, 4, flags]);
        self.bytes.extend_from_slice(&delay.to_le_bytes());
        self.bytes.extend_from_slice(&[transparent.unwrap_or(0), 0]);
        self
    }

    /// Image descriptor and LZW data for `pixels`, given in display order.
    pub fn image(
        mut self,
        at: Rect,
        interlaced: bool,
        local: Option<&[[u8; 3]]>,
        pixels: &[u8],
    ) -> Self {
        self.bytes.push(b',');
        for field in [at.x, at.y, at.width, at.height] {
            self.bytes.extend_from_slice(&field.to_le_bytes());
        }
        let mut flags = if interlaced { 0x40 } else { 0 };
        if let Some(colors) = local {
            flags |= 0x80 | color_table_bits(colors.len());
        }
        self.bytes.push(flags);
        if let Some(colors) = local {
            push_colors(&mut self.bytes, colors);
        }

        let width = usize::from(at.width);
        let ordered = if interlaced {
            interlace_rows(pixels, width)
        } else {
            pixels.to_vec()
        };
        let data_size = 2;
        self.bytes.push(data_size);
        self.lzw_blocks(&encode_literal(data_size, &ordered, true))
    }

    /// Raw image data with an explicit minimum code size.
    pub fn raw_image(mut self, at: Rect, data_size: u8, data: &[u8]) -> Self {
        self.bytes.push(b',');
        for field in [at.x, at.y, at.width, at.height] {
            self.bytes.extend_from_slice(&field.to_le_bytes());
        }
        self.bytes.push(0);
        self.bytes.push(data_size);
        self.lzw_blocks(data)
    }

    fn lzw_blocks(mut self, data: &[u8]) -> Self {
        for chunk in data.chunks(255) {
            self.bytes.push(chunk.len() as u8);
            self.bytes.extend_from_slice(chunk);
        }
        self.bytes.push(0);
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.bytes.push(b';');
        self.bytes
    }
}

/// Reorder display rows into the four interlace passes.
fn interlace_rows(pixels: &[u8], width: usize) -> Vec<u8> {
    let height = pixels.len() / width;
    let mut order: Vec<usize> = (0..height).step_by(8).collect();
    order.extend((4..height).step_by(8));
    order.extend((2..height).step_by(4));
    order.extend((1..height).step_by(2));
    order
        .into_iter()
        .flat_map(|y| pixels[y * width..(y + 1) * width].iter().copied())
        .collect()
}

/// LZW-encode `indices` using only single-index codes, tracking the code
/// width the decoder will use. With `reset`, a clear code is sent before
/// the dictionary fills.
pub fn encode_literal(data_size: u8, indices: &[u8], reset: bool) -> Vec<u8> {
    let clear = 1u32 << data_size;
    let mut size = u32::from(data_size) + 1;
    let mut avail = clear + 2;
    let mut first = true;
    let mut out = Vec::new();
    let mut acc = 0u32;
    let mut nbits = 0u32;
    let mut emit = |code: u32, size: u32, out: &mut Vec<u8>| {
        acc |= code << nbits;
        nbits += size;
        while nbits >= 8 {
            out.push(acc as u8);
            acc >>= 8;
            nbits -= 8;
        }
    };
    emit(clear, size, &mut out);
    for &index in indices {
        emit(u32::from(index), size, &mut out);
        if !first && avail < 4096 {
            avail += 1;
            if avail == (1 << size) && avail < 4096 {
                size += 1;
            }
        }
        first = false;
        if reset && avail >= 4000 {
            emit(clear, size, &mut out);
            size = u32::from(data_size) + 1;
            avail = clear + 2;
            first = true;
        }
    }
    emit(clear + 1, size, &mut out);
    if nbits > 0 {
        out.push(acc as u8);
    }
    out
}

// ── Pixels ───────────────────────────────────────────────────────────

/// Flatten RGBA pixels into bytes.
pub fn rgba(pixels: &[[u8; 4]]) -> Vec<u8> {
    pixels.iter().flatten().copied().collect()
}
