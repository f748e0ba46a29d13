#![no_main]
use libfuzzer_sys::fuzz_target;
use zenclassic::{DecodeOptions, DecodeRequest, Limits, PixelLayout};

fuzz_target!(|data: &[u8]| {
    let limits = Limits {
        max_pixels: Some(16 * 1024 * 1024),
        max_memory_bytes: Some(64 * 1024 * 1024),
        ..Default::default()
    };

    // Auto-detected decode (BMP, ICO, GIF) must never panic
    let _ = DecodeRequest::new(data)
        .with_limits(&limits)
        .decode(enough::Unstoppable);

    // Sampled BGRA output and a later GIF frame
    let opts = DecodeOptions::new(PixelLayout::Bgra8).with_sample_size(3);
    let _ = DecodeRequest::new(data)
        .with_limits(&limits)
        .with_options(opts)
        .with_frame(1)
        .decode(enough::Unstoppable);
});
