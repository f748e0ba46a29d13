//! BMP decoding through the public API.

#![cfg(feature = "bmp")]

mod common;

use common::*;
use enough::Unstoppable;
use zenclassic::*;

/// 2x2 OS/2 1-bit image, black and white on a diagonal.
fn os2_checker() -> Vec<u8> {
    let palette = [0, 0, 0, 255, 255, 255];
    // Bottom row first: white, black; then the top row: black, white.
    let pixels = padded_rows(&[&[0b1000_0000], &[0b0100_0000]]);
    bmp(&info_os2(2, 2, 1), &palette, &pixels)
}

const WHITE: [u8; 4] = [255, 255, 255, 255];

// ── Standard ─────────────────────────────────────────────────────────

#[test]
fn os2_one_bit_bottom_up() {
    let data = os2_checker();
    let decoder = BmpDecoder::new(&data, None).unwrap();
    assert_eq!(decoder.header_type(), HeaderType::Os2V1);
    assert_eq!(decoder.bits_per_pixel(), 1);
    let info = decoder.info();
    assert_eq!((info.width, info.height), (2, 2));
    assert_eq!(info.layout, PixelLayout::Index8);
    assert_eq!(info.alpha, AlphaMode::Opaque);

    let decoded = DecodeRequest::new(&data).decode(Unstoppable).unwrap();
    assert_eq!(decoded.status, Status::Success);
    assert_eq!(decoded.rows_decoded, 2);
    assert_eq!(decoded.pixels(), &rgba(&[BLACK, WHITE, WHITE, BLACK])[..]);
}

#[test]
fn index_output_with_color_table() {
    let data = os2_checker();
    let decoded = DecodeRequest::new(&data)
        .with_options(DecodeOptions::new(PixelLayout::Index8).with_alpha(AlphaMode::Opaque))
        .decode(Unstoppable)
        .unwrap();
    assert_eq!(decoded.layout, PixelLayout::Index8);
    assert_eq!(decoded.pixels(), &[0, 1, 1, 0]);
    let table = decoded.color_table.expect("index output carries its palette");
    assert_eq!(table.len(), 2);
    assert_eq!(table.colors()[0], BLACK);
    assert_eq!(table.colors()[1], WHITE);
}

#[test]
fn bgra_output_swaps_channels() {
    let data = bmp24(2, 1, |x, _| if x == 0 { [10, 20, 30] } else { [40, 50, 60] });
    let decoded = DecodeRequest::new(&data)
        .with_options(DecodeOptions::new(PixelLayout::Bgra8))
        .decode(Unstoppable)
        .unwrap();
    assert_eq!(decoded.pixels(), &[30, 20, 10, 255, 60, 50, 40, 255]);
}

#[test]
fn truecolor_rows_are_padded() {
    // Three 24-bit pixels take 9 bytes, padded to 12.
    let data = bmp24(3, 2, |x, y| [x as u8 * 50, y as u8 * 100, 7]);
    let decoded = DecodeRequest::new(&data).decode(Unstoppable).unwrap();
    assert_eq!(decoded.stride(), 12);
    assert_eq!(
        decoded.pixels(),
        &rgba(&[
            [0, 0, 7, 255],
            [50, 0, 7, 255],
            [100, 0, 7, 255],
            [0, 100, 7, 255],
            [50, 100, 7, 255],
            [100, 100, 7, 255],
        ])[..]
    );
}

#[test]
fn sampling_keeps_centered_pixels() {
    let data = bmp24(4, 4, |x, y| [x as u8 * 60, y as u8 * 60, 0]);
    let decoded = DecodeRequest::new(&data)
        .with_options(DecodeOptions::default().with_sample_size(2))
        .decode(Unstoppable)
        .unwrap();
    assert_eq!((decoded.width, decoded.height), (2, 2));
    // Rows and columns 1 and 3 survive.
    assert_eq!(
        decoded.pixels(),
        &rgba(&[
            [60, 60, 0, 255],
            [180, 60, 0, 255],
            [60, 180, 0, 255],
            [180, 180, 0, 255],
        ])[..]
    );
}

// ── Bit masks ────────────────────────────────────────────────────────

#[test]
fn rgb565_bit_masks() {
    let mut masks = Vec::new();
    for mask in [0xf800u32, 0x07e0, 0x001f] {
        masks.extend_from_slice(&mask.to_le_bytes());
    }
    let px = |v: u16| v.to_le_bytes();
    let top = [px(0xf800), px(0x07e0)].concat();
    let bottom = [px(0x001f), px(0xffff)].concat();
    let data = bmp(
        &info_v1(2, -2, 16, 3, 0),
        &masks,
        &padded_rows(&[&top, &bottom]),
    );

    let decoder = BmpDecoder::new(&data, None).unwrap();
    assert!(decoder.bit_masks().is_some());
    assert_eq!(decoder.info().alpha, AlphaMode::Opaque);

    let decoded = DecodeRequest::new(&data).decode(Unstoppable).unwrap();
    assert_eq!(
        decoded.pixels(),
        &rgba(&[RED, GREEN, BLUE, WHITE])[..]
    );
}

#[test]
fn sixteen_bit_defaults_to_555() {
    let px = |v: u16| v.to_le_bytes();
    let row = [px(0x7c00), px(0x03e0), px(0x001f)].concat();
    let data = bmp(&info_v1(3, 1, 16, 0, 0), &[], &padded_rows(&[&row]));
    let decoded = DecodeRequest::new(&data).decode(Unstoppable).unwrap();
    assert_eq!(decoded.pixels(), &rgba(&[RED, GREEN, BLUE])[..]);
}

// ── RLE ──────────────────────────────────────────────────────────────

#[test]
fn rle8_runs_deltas_and_literals() {
    let data = rle8_sample();
    let decoder = BmpDecoder::new(&data, None).unwrap();
    assert_eq!(decoder.info().layout, PixelLayout::Rgba8);
    assert_eq!(decoder.info().alpha, AlphaMode::Unpremultiplied);

    let decoded = DecodeRequest::new(&data).decode(Unstoppable).unwrap();
    assert_eq!(decoded.status, Status::Success);
    assert_eq!(
        decoded.pixels(),
        &rgba(&[
            RED, RED, RED, RED, //
            CLEAR, RED, GREEN, RED, //
            GREEN, GREEN, CLEAR, CLEAR,
        ])[..]
    );
}

#[test]
fn rle_cannot_decode_to_index() {
    let data = rle8_sample();
    let err = DecodeRequest::new(&data)
        .with_options(DecodeOptions::new(PixelLayout::Index8))
        .decode(Unstoppable)
        .unwrap_err();
    assert_eq!(err.status(), Status::InvalidConversion);
}

#[test]
fn rle_cannot_decode_to_opaque() {
    let data = rle8_sample();
    let err = DecodeRequest::new(&data)
        .with_options(DecodeOptions::default().with_alpha(AlphaMode::Opaque))
        .decode(Unstoppable)
        .unwrap_err();
    assert!(matches!(err, CodecError::InvalidConversion(_)));
}

#[test]
fn rle_missing_end_of_file_is_incomplete() {
    let mut data = rle8_sample();
    data.truncate(data.len() - 2);
    let total = data.len() as u32;
    data[2..6].copy_from_slice(&total.to_le_bytes());

    let decoded = DecodeRequest::new(&data).decode(Unstoppable).unwrap();
    assert_eq!(decoded.status, Status::IncompleteInput);
    // Two rows ended with an end-of-line token; the top row did not.
    assert_eq!(decoded.rows_decoded, 2);
}

// ── Partial input ────────────────────────────────────────────────────

#[test]
fn truncated_rows_are_filled() {
    let full = bmp(
        &info_v1(1, 4, 24, 0, 0),
        &[],
        &padded_rows(&[&[0, 0, 255], &[0, 255, 0], &[255, 0, 0], &[0, 0, 0]]),
    );
    // Keep the bottom two rows and part of the third.
    let data = &full[..full.len() - 6];
    let opts = DecodeOptions::default().with_alpha(AlphaMode::Opaque);
    let decoded = DecodeRequest::new(data)
        .with_options(opts)
        .decode(Unstoppable)
        .unwrap();
    assert_eq!(decoded.status, Status::IncompleteInput);
    assert_eq!(decoded.rows_decoded, 2);
    assert_eq!(
        decoded.pixels(),
        &rgba(&[BLACK, BLACK, GREEN, RED])[..]
    );
}

#[test]
fn resume_after_push() {
    let full = bmp24(3, 5, |x, y| [x as u8, y as u8, 9]);
    let reference = DecodeRequest::new(&full).decode(Unstoppable).unwrap();

    let split = full.len() - 20;
    let mut decoder = BmpDecoder::new(&full[..split], None).unwrap();
    let opts = DecodeOptions::default();
    let stride = 12;
    let mut pixels = vec![0u8; stride * 5];
    let err = decoder
        .decode(&mut pixels, stride, &opts, &Unstoppable)
        .unwrap_err();
    let rows = err.rows_decoded().unwrap();
    assert!(rows < 5);

    decoder.push(&full[split..]);
    let rows = decoder
        .incremental_decode(&mut pixels, stride, &Unstoppable)
        .unwrap();
    assert_eq!(rows, 5);
    assert_eq!(&pixels[..], reference.pixels());
}

#[test]
fn buffer_too_small() {
    let data = bmp24(4, 4, |_, _| [1, 2, 3]);
    let mut decoder = BmpDecoder::new(&data, None).unwrap();
    let mut pixels = vec![0u8; 16 * 3];
    let err = decoder
        .decode(&mut pixels, 16, &DecodeOptions::default(), &Unstoppable)
        .unwrap_err();
    assert!(matches!(err, CodecError::BufferTooSmall { .. }));
}

// ── Rejections ───────────────────────────────────────────────────────

#[test]
fn embedded_jpeg_is_unimplemented() {
    let data = bmp(&info_v1(1, 1, 24, 4, 0), &[], &[0; 4]);
    let err = BmpDecoder::new(&data, None).err().unwrap();
    assert_eq!(err.status(), Status::Unimplemented);
}

#[test]
fn unknown_compression_is_invalid() {
    let data = bmp(&info_v1(1, 1, 24, 9, 0), &[], &[0; 4]);
    assert!(matches!(
        BmpDecoder::new(&data, None),
        Err(CodecError::InvalidInput(_))
    ));
}

#[test]
fn truncated_header_is_invalid() {
    let data = os2_checker();
    assert!(matches!(
        BmpDecoder::new(&data[..20], None),
        Err(CodecError::InvalidInput(_))
    ));
}

#[test]
fn unknown_signature() {
    assert!(matches!(
        open(b"PK\x03\x04 not an image", None),
        Err(CodecError::UnrecognizedFormat)
    ));
}

#[test]
fn limits_reject_large_images() {
    let data = bmp24(8, 2, |_, _| [0, 0, 0]);
    let limits = Limits {
        max_width: Some(4),
        ..Default::default()
    };
    let err = DecodeRequest::new(&data)
        .with_limits(&limits)
        .decode(Unstoppable)
        .unwrap_err();
    assert!(matches!(err, CodecError::LimitExceeded(_)));
}

#[test]
fn cancellation_stops_decoding() {
    struct Cancelled;
    impl Stop for Cancelled {
        fn check(&self) -> Result<(), enough::StopReason> {
            Err(enough::StopReason::Cancelled)
        }
    }
    let data = bmp24(2, 2, |_, _| [0, 0, 0]);
    let err = DecodeRequest::new(&data).decode(Cancelled).unwrap_err();
    assert_eq!(err.status(), Status::Cancelled);
}
