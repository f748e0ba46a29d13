#![no_main]
use libfuzzer_sys::fuzz_target;
use zenclassic::{CodecError, DecodeOptions, Limits, open};

// The first two bytes pick the split sizes; the rest is the image.
fuzz_target!(|input: &[u8]| {
    let Some((&[first, chunk], data)) = input.split_first_chunk::<2>() else {
        return;
    };
    let limits = Limits {
        max_pixels: Some(4 * 1024 * 1024),
        ..Default::default()
    };
    let chunk = usize::from(chunk).max(1);
    let mut end = usize::from(first).min(data.len());
    let mut codec = loop {
        match open(&data[..end], Some(&limits)) {
            Ok(codec) => break codec,
            Err(_) if end < data.len() => end = (end + chunk).min(data.len()),
            Err(_) => return,
        }
    };

    let info = codec.info();
    let stride = info.width as usize * 4;
    let mut pixels = vec![0u8; stride * info.height as usize];
    let opts = DecodeOptions::default();
    if codec.start_decode(&opts).is_err() {
        return;
    }
    loop {
        match codec.incremental_decode(&mut pixels, stride, &enough::Unstoppable) {
            Err(CodecError::IncompleteInput { rows_decoded }) if end < data.len() => {
                assert!(rows_decoded <= info.height as usize);
                let next = (end + chunk).min(data.len());
                codec.push(&data[end..next]);
                end = next;
            }
            _ => break,
        }
    }
});
