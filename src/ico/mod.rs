//! ICO and CUR containers of BMP images.
//!
//! The directory lists `{size, offset}` for each embedded image; entries are
//! consumed in ascending offset order regardless of how the directory
//! stores them. Entries that fail to parse are skipped, and the container
//! only fails when none succeed.

use alloc::vec::Vec;

use enough::Stop;

use crate::bmp::BmpDecoder;
use crate::bytes::{u16_le, u32_le};
use crate::decode::DecodeOptions;
use crate::error::CodecError;
use crate::info::ImageInfo;
use crate::limits::Limits;
use crate::stream::{Cursor, SourceBuffer};

const DIRECTORY_HEADER_BYTES: usize = 6;
const DIRECTORY_ENTRY_BYTES: usize = 16;
const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct DirEntry {
    offset: usize,
    size: usize,
}

/// Decoder for ICO/CUR files holding one or more BMP images.
pub struct IcoDecoder {
    source: SourceBuffer,
    entries: Vec<DirEntry>,
    next_entry: usize,
    bytes_read: usize,
    limits: Option<Limits>,
    images: Vec<BmpDecoder>,
    largest: usize,
    active: Option<usize>,
}

impl IcoDecoder {
    /// Parse the directory and every embedded image whose bytes are present.
    ///
    /// Fails with [`CodecError::IncompleteInput`] when no image could be
    /// parsed yet but later entries have not fully arrived, and with
    /// [`CodecError::InvalidInput`] when no entry holds a usable image.
    pub fn new(data: &[u8], limits: Option<&Limits>) -> Result<Self, CodecError> {
        let mut cursor = Cursor::new(data);
        let header = cursor.read_bytes(DIRECTORY_HEADER_BYTES, "ico directory header")?;
        let count = usize::from(u16_le(header, 4).unwrap_or(0));
        if count == 0 {
            return Err(CodecError::invalid("ico directory has no entries"));
        }
        let raw = cursor.read_bytes(count * DIRECTORY_ENTRY_BYTES, "ico directory")?;
        let mut entries: Vec<DirEntry> = raw
            .chunks_exact(DIRECTORY_ENTRY_BYTES)
            .map(|e| DirEntry {
                size: u32_le(e, 8).unwrap_or(0) as usize,
                offset: u32_le(e, 12).unwrap_or(0) as usize,
            })
            .collect();
        entries.sort_by_key(|e| e.offset);

        let mut ico = Self {
            source: SourceBuffer::new(data),
            entries,
            next_entry: 0,
            bytes_read: cursor.position(),
            limits: limits.cloned(),
            images: Vec::new(),
            largest: 0,
            active: None,
        };
        ico.scan();
        if ico.images.is_empty() {
            if ico.next_entry < ico.entries.len() {
                return Err(CodecError::IncompleteInput { rows_decoded: 0 });
            }
            return Err(CodecError::invalid("ico file holds no decodable images"));
        }
        Ok(ico)
    }

    /// Parse entries in offset order until one has not fully arrived.
    fn scan(&mut self) {
        while let Some(&entry) = self.entries.get(self.next_entry) {
            if entry.offset < self.bytes_read {
                log::warn!(
                    "ico entry at {} overlaps data already read, skipping",
                    entry.offset
                );
                self.next_entry += 1;
                continue;
            }
            let Some(bytes) = self.source.get(entry.offset, entry.size) else {
                log::debug!("ico entry at {} is not complete yet", entry.offset);
                break;
            };
            self.next_entry += 1;
            self.bytes_read = entry.offset + entry.size;
            if bytes.starts_with(&PNG_SIGNATURE) {
                log::warn!("skipping png image embedded in ico: unimplemented");
                continue;
            }
            match BmpDecoder::new_in_ico(bytes, self.limits.as_ref()) {
                Ok(image) => {
                    let info = image.info();
                    let area = u64::from(info.width) * u64::from(info.height);
                    let best = self.images.get(self.largest).map(|b| {
                        let b = b.info();
                        u64::from(b.width) * u64::from(b.height)
                    });
                    if best.is_none_or(|best| area > best) {
                        self.largest = self.images.len();
                    }
                    self.images.push(image);
                }
                Err(e) => log::warn!("skipping ico entry at {}: {e}", entry.offset),
            }
        }
    }

    /// Info of the largest embedded image (the first, on ties).
    pub fn info(&self) -> ImageInfo {
        self.images[self.largest].info()
    }

    /// Native dimensions of every decodable embedded image, by ascending
    /// data offset.
    pub fn sizes(&self) -> Vec<(u32, u32)> {
        self.images
            .iter()
            .map(|image| {
                let info = image.info();
                (info.width, info.height)
            })
            .collect()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.source.push(bytes);
        self.scan();
    }

    /// Start decoding the largest image.
    pub fn start_decode(&mut self, opts: &DecodeOptions) -> Result<(), CodecError> {
        let info = self.info();
        self.start_decode_sized(opts, info.width, info.height)
    }

    /// Start decoding the first image of exactly `width` x `height` that
    /// accepts `opts`.
    pub fn start_decode_sized(
        &mut self,
        opts: &DecodeOptions,
        width: u32,
        height: u32,
    ) -> Result<(), CodecError> {
        let mut last_error = None;
        for i in self.candidates(width, height) {
            match self.images[i].start_decode(opts) {
                Ok(()) => {
                    log::debug!("ico decoding entry {i} at {width}x{height}");
                    self.active = Some(i);
                    return Ok(());
                }
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| {
            CodecError::conversion(alloc::format!("no embedded image is {width}x{height}"))
        }))
    }

    pub fn incremental_decode(
        &mut self,
        dst: &mut [u8],
        stride: usize,
        stop: &dyn Stop,
    ) -> Result<usize, CodecError> {
        let Some(i) = self.active else {
            return Err(CodecError::invalid("incremental_decode called before start_decode"));
        };
        self.images[i].incremental_decode(dst, stride, stop)
    }

    /// Decode the largest image.
    pub fn decode(
        &mut self,
        dst: &mut [u8],
        stride: usize,
        opts: &DecodeOptions,
        stop: &dyn Stop,
    ) -> Result<usize, CodecError> {
        let info = self.info();
        self.decode_sized(dst, stride, opts, info.width, info.height, stop)
    }

    /// Decode the first image of exactly `width` x `height` that produces
    /// pixels. Candidates failing outright are skipped; a partial result is
    /// returned as is.
    pub fn decode_sized(
        &mut self,
        dst: &mut [u8],
        stride: usize,
        opts: &DecodeOptions,
        width: u32,
        height: u32,
        stop: &dyn Stop,
    ) -> Result<usize, CodecError> {
        let mut last_error = None;
        for i in self.candidates(width, height) {
            self.active = Some(i);
            match self.images[i].decode(dst, stride, opts, stop) {
                Ok(rows) => return Ok(rows),
                Err(e) if e.rows_decoded().is_some() => return Err(e),
                Err(CodecError::Cancelled(reason)) => return Err(CodecError::Cancelled(reason)),
                Err(e) => {
                    log::debug!("ico entry {i} failed: {e}");
                    last_error = Some(e);
                }
            }
        }
        self.active = None;
        Err(last_error.unwrap_or_else(|| {
            CodecError::conversion(alloc::format!("no embedded image is {width}x{height}"))
        }))
    }

    pub fn fill_incomplete(
        &self,
        dst: &mut [u8],
        stride: usize,
        opts: &DecodeOptions,
        rows_decoded: usize,
    ) -> Result<(), CodecError> {
        let image = &self.images[self.active.unwrap_or(self.largest)];
        image.fill_incomplete(dst, stride, opts, rows_decoded)
    }

    fn candidates(&self, width: u32, height: u32) -> Vec<usize> {
        self.images
            .iter()
            .enumerate()
            .filter(|(_, image)| {
                let info = image.info();
                info.width == width && info.height == height
            })
            .map(|(i, _)| i)
            .collect()
    }
}
