//! GIF decoding: block parsing, LZW decompression and frame compositing.
//!
//! [`GifDecoder`] keeps every byte pushed to it and parses lazily: opening
//! reads up to the first image descriptor, and later calls parse only as far
//! as they need. Frames are composited the way browsers show them, so
//! decoding frame `n` yields the full screen as it looks while `n` is
//! displayed.
//!
//! ```no_run
//! use zenclassic::{DecodeOptions, Unstoppable};
//! use zenclassic::gif::{FrameOptions, GifDecoder};
//!
//! # fn main() -> Result<(), zenclassic::CodecError> {
//! # let data: &[u8] = &[];
//! let mut gif = GifDecoder::new(data, None)?;
//! let info = gif.info();
//! let stride = info.width as usize * 4;
//! let mut canvas = vec![0u8; stride * info.height as usize];
//! let opts = DecodeOptions::default();
//! for index in 0..gif.frame_count() {
//!     let frame = FrameOptions {
//!         index,
//!         prior_frame_composited: index > 0,
//!     };
//!     gif.decode_frame(&mut canvas, stride, &opts, frame, &Unstoppable)?;
//! }
//! # Ok(())
//! # }
//! ```

mod composite;
mod frame;
mod lzw;
mod reader;

pub use frame::{DisposalMethod, FrameRect};
pub use reader::Repetitions;

use alloc::vec::Vec;

use enough::Stop;

use crate::decode::{DecodeOptions, Target};
use crate::error::CodecError;
use crate::info::{ImageFormat, ImageInfo};
use crate::limits::{Limits, check_optional};
use crate::pixel::{AlphaMode, PixelLayout};
use crate::stream::SourceBuffer;
use composite::{FrameDecoder, erase_rect, pack_for};
use reader::{GifReader, Query};

/// Which frame to decode, and what the destination already holds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameOptions {
    pub index: usize,
    /// The destination already shows the frame this one is drawn on top of
    /// (its [`FrameInfo::required_frame`]), so it is not decoded again.
    pub prior_frame_composited: bool,
}

/// What is known about one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameInfo {
    /// Earlier frame this one is drawn on top of. `None` for frames that
    /// can be decoded on their own.
    pub required_frame: Option<usize>,
    pub duration_ms: u32,
    /// All of the frame's data has arrived.
    pub fully_received: bool,
    /// Alpha of the composited screen for this frame.
    pub alpha: AlphaMode,
    pub disposal: DisposalMethod,
    pub rect: FrameRect,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Decode(usize),
    Erase(FrameRect),
}

struct ActiveDecode {
    target: Target,
    steps: Vec<Step>,
    next_step: usize,
    frame: Option<FrameDecoder>,
}

/// Streaming decoder for single and multi-frame GIF files.
pub struct GifDecoder {
    source: SourceBuffer,
    reader: GifReader,
    info: ImageInfo,
    active: Option<ActiveDecode>,
}

impl GifDecoder {
    /// Parse up to the first image descriptor.
    ///
    /// Fails with [`CodecError::IncompleteInput`] when the descriptor has
    /// not arrived yet.
    pub fn new(data: &[u8], limits: Option<&Limits>) -> Result<Self, CodecError> {
        let source = SourceBuffer::new(data);
        let mut reader = GifReader::new();
        reader.parse(&source, Query::Size)?;
        if !reader.frames.first().is_some_and(|f| f.header_defined) {
            if reader.parse_completed() {
                return Err(CodecError::invalid("gif has no frames"));
            }
            return Err(CodecError::IncompleteInput { rows_decoded: 0 });
        }
        check_optional(limits, reader.screen_width, reader.screen_height)?;

        let info = ImageInfo {
            width: reader.screen_width,
            height: reader.screen_height,
            layout: PixelLayout::Rgba8,
            alpha: if reader.first_frame_has_alpha {
                AlphaMode::Unpremultiplied
            } else {
                AlphaMode::Opaque
            },
            format: ImageFormat::Gif,
        };
        log::debug!(
            "gif screen {}x{}, first frame alpha {:?}",
            info.width,
            info.height,
            info.alpha
        );
        Ok(Self {
            source,
            reader,
            info,
            active: None,
        })
    }

    /// Screen size, and the alpha of the first frame.
    pub fn info(&self) -> ImageInfo {
        self.info
    }

    /// Append bytes that arrived after the decoder was opened.
    pub fn push(&mut self, bytes: &[u8]) {
        self.source.push(bytes);
    }

    fn parse(&mut self, query: Query) {
        if let Err(e) = self.reader.parse(&self.source, query) {
            log::warn!("gif parsing stopped: {e}");
        }
    }

    /// Number of frames in the data received so far.
    pub fn frame_count(&mut self) -> usize {
        self.parse(Query::FrameCount);
        self.reader.images_count()
    }

    /// Info for frame `index`, if parsing has reached its data.
    pub fn frame_info(&self, index: usize) -> Option<FrameInfo> {
        if index >= self.reader.images_count() {
            return None;
        }
        let frame = self.reader.frames.get(index)?;
        Some(FrameInfo {
            required_frame: frame.required_frame,
            duration_ms: frame.duration_ms,
            fully_received: frame.complete,
            alpha: if frame.has_alpha {
                AlphaMode::Unpremultiplied
            } else {
                AlphaMode::Opaque
            },
            disposal: frame.disposal,
            rect: frame.rect,
        })
    }

    /// How many times the animation repeats, from the Netscape extension.
    /// Files without one play once: `Finite(0)`.
    pub fn repetition_count(&mut self) -> Repetitions {
        self.parse(Query::LoopCount);
        self.reader.loop_count.unwrap_or(Repetitions::Finite(0))
    }

    /// Validate `opts` for frame `frame.index` and plan its decode.
    ///
    /// Frames the requested one depends on are decoded first, unless
    /// `prior_frame_composited` says the destination already holds them.
    pub fn start_frame(
        &mut self,
        opts: &DecodeOptions,
        frame: FrameOptions,
    ) -> Result<(), CodecError> {
        self.active = None;
        let index = frame.index;
        self.parse(Query::Frame(index));
        if index >= self.reader.images_count() {
            if self.reader.parse_completed() {
                return Err(CodecError::invalid(alloc::format!("gif has no frame {index}")));
            }
            return Err(CodecError::IncompleteInput { rows_decoded: 0 });
        }

        let frames = &self.reader.frames;
        let alpha = if frames[index].has_alpha {
            AlphaMode::Unpremultiplied
        } else {
            AlphaMode::Opaque
        };
        let target = Target::new(opts, &ImageInfo { alpha, ..self.info })?;

        let restores_bg = |i: usize| frames[i].disposal == DisposalMethod::RestoreBgColor;
        let mut steps = Vec::new();
        match frames[index].required_frame {
            None => {}
            Some(required) if frame.prior_frame_composited => {
                if restores_bg(required) {
                    steps.push(Step::Erase(frames[required].rect));
                }
            }
            Some(required) => {
                let mut chain = Vec::new();
                let mut next = Some(required);
                while let Some(i) = next {
                    chain.push(i);
                    next = frames[i].required_frame;
                }
                for &i in chain.iter().rev() {
                    steps.push(Step::Decode(i));
                    if restores_bg(i) {
                        steps.push(Step::Erase(frames[i].rect));
                    }
                }
            }
        }
        steps.push(Step::Decode(index));
        log::debug!("gif frame {index} plan: {steps:?}");

        self.active = Some(ActiveDecode {
            target,
            steps,
            next_step: 0,
            frame: None,
        });
        Ok(())
    }

    /// Decode as much of the started frame as the input allows.
    ///
    /// Returns the number of output rows once the frame is complete. Short
    /// input gives [`CodecError::IncompleteInput`]; push more bytes and call
    /// again with the same buffer to resume. While a frame the requested one
    /// depends on is still being decoded, partial results report zero rows.
    pub fn incremental_decode(
        &mut self,
        dst: &mut [u8],
        stride: usize,
        stop: &dyn Stop,
    ) -> Result<usize, CodecError> {
        let Self {
            source,
            reader,
            active,
            ..
        } = self;
        let Some(active) = active.as_mut() else {
            return Err(CodecError::invalid("incremental_decode called before start_frame"));
        };
        active.target.check_buffer(dst, stride)?;
        let screen = (reader.screen_width, reader.screen_height);
        let last = active.steps.len() - 1;

        while let Some(&step) = active.steps.get(active.next_step) {
            match step {
                Step::Erase(rect) => erase_rect(&active.target, dst, stride, rect, screen),
                Step::Decode(i) => {
                    if let Err(e) = reader.parse(source, Query::Frame(i)) {
                        log::warn!("gif parsing stopped: {e}");
                    }
                    if active.frame.is_none() {
                        let table = reader.color_table(source, i, pack_for(&active.target));
                        if table.is_none() {
                            log::debug!("gif frame {i} has no color table");
                        }
                        active.frame = Some(FrameDecoder::new(
                            &reader.frames[i],
                            table,
                            &active.target,
                            screen,
                            dst,
                            stride,
                        )?);
                    }
                    if let Some(decoder) = active.frame.as_mut() {
                        match decoder.decode(&reader.frames[i], source, dst, stride, stop) {
                            Ok(_) => active.frame = None,
                            Err(e) if active.next_step == last => return Err(e),
                            Err(CodecError::IncompleteInput { .. }) => {
                                return Err(CodecError::IncompleteInput { rows_decoded: 0 });
                            }
                            Err(CodecError::ErrorInInput { .. }) => {
                                return Err(CodecError::ErrorInInput { rows_decoded: 0 });
                            }
                            Err(e) => return Err(e),
                        }
                    }
                }
            }
            active.next_step += 1;
        }
        Ok(active.target.height())
    }

    /// [`GifDecoder::start_frame`] followed by [`GifDecoder::incremental_decode`].
    pub fn decode_frame(
        &mut self,
        dst: &mut [u8],
        stride: usize,
        opts: &DecodeOptions,
        frame: FrameOptions,
        stop: &dyn Stop,
    ) -> Result<usize, CodecError> {
        self.start_frame(opts, frame)?;
        self.incremental_decode(dst, stride, stop)
    }

    /// Decode the first frame.
    pub fn decode(
        &mut self,
        dst: &mut [u8],
        stride: usize,
        opts: &DecodeOptions,
        stop: &dyn Stop,
    ) -> Result<usize, CodecError> {
        self.decode_frame(dst, stride, opts, FrameOptions::default(), stop)
    }

    /// Fill the rows a partial decode did not reach with the fill value.
    pub fn fill_incomplete(
        &self,
        dst: &mut [u8],
        stride: usize,
        opts: &DecodeOptions,
        rows_decoded: usize,
    ) -> Result<(), CodecError> {
        let target = match &self.active {
            Some(active) => active.target,
            None => Target::new(opts, &self.info)?,
        };
        target.check_buffer(dst, stride)?;
        target.fill_incomplete(dst, stride, rows_decoded, false);
        Ok(())
    }
}
