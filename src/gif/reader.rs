//! Resumable GIF block parser.
//!
//! The parser is a state machine over the GIF block structure. Each state
//! declares how many bytes it needs; when fewer have arrived, parsing stops
//! and resumes from the same state on the next call. Pixel data is not
//! touched here: LZW sub-blocks are recorded by position and decoded later.

use alloc::rc::Rc;
use alloc::vec::Vec;

use crate::bytes::u16_le;
use crate::color::{ColorTable, PackKind};
use crate::error::CodecError;
use crate::stream::SourceBuffer;

use super::frame::{ColorMap, DisposalMethod, FrameContext, FrameRect, LzwBlock};

const BYTES_PER_COLORMAP_ENTRY: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Type,
    GlobalHeader,
    GlobalColormap,
    ImageStart,
    Extension,
    ControlExtension,
    ConsumeBlock,
    SkipBlock,
    CommentExtension,
    ConsumeComment,
    ApplicationExtension,
    NetscapeExtensionBlock,
    ConsumeNetscapeExtension,
    ImageHeader,
    ImageColormap,
    LzwStart,
    SubBlock,
    Lzw,
    Done,
}

/// How far a call to [`GifReader::parse`] should go.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Query {
    /// Until the first image descriptor, which fixes the screen size.
    Size,
    /// Until the end of the stream.
    FrameCount,
    /// Until the Netscape loop count, or the end of the stream.
    LoopCount,
    /// Until frame `n` has all of its data.
    Frame(usize),
}

/// Loop count from the Netscape application extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Repetitions {
    /// Play the animation this many extra times.
    Finite(u16),
    Infinite,
}

pub(crate) struct GifReader {
    state: State,
    /// Absolute position of the bytes the current state consumes.
    pos: usize,
    need: usize,
    parse_completed: bool,
    pub screen_width: u32,
    pub screen_height: u32,
    pub global_map: ColorMap,
    pub frames: Vec<FrameContext>,
    pub loop_count: Option<Repetitions>,
    pub first_frame_has_alpha: bool,
}

impl GifReader {
    pub(crate) fn new() -> Self {
        Self {
            state: State::Type,
            pos: 0,
            need: 6,
            parse_completed: false,
            screen_width: 0,
            screen_height: 0,
            global_map: ColorMap::default(),
            frames: Vec::new(),
            loop_count: None,
            first_frame_has_alpha: false,
        }
    }

    pub(crate) fn parse_completed(&self) -> bool {
        self.parse_completed
    }

    /// Number of frames whose data has started; a frame still waiting for
    /// its color map is not counted.
    pub(crate) fn images_count(&self) -> usize {
        match self.frames.last() {
            None => 0,
            Some(last) if last.reached_start_of_data() => self.frames.len(),
            Some(_) => self.frames.len() - 1,
        }
    }

    fn goto(&mut self, need: usize, state: State) {
        self.need = need;
        self.state = state;
    }

    fn fail(&mut self, msg: &str) -> CodecError {
        self.goto(0, State::Done);
        CodecError::invalid(alloc::format!("gif: {msg}"))
    }

    fn current_frame_is_first_frame(&self) -> bool {
        self.frames.is_empty() || (self.frames.len() == 1 && !self.frames[0].complete)
    }

    fn add_frame_if_necessary(&mut self) {
        if self.frames.last().is_none_or(|f| f.complete) {
            self.frames.push(FrameContext::new(self.frames.len()));
        }
    }

    /// Parse as far as `query` needs and the input allows.
    ///
    /// Running out of input is not an error. An error ends parsing for good;
    /// frames found before it stay available.
    pub(crate) fn parse(&mut self, source: &SourceBuffer, query: Query) -> Result<(), CodecError> {
        if self.parse_completed {
            return Ok(());
        }
        if query == Query::LoopCount && self.loop_count.is_some() {
            return Ok(());
        }
        if let Query::Frame(n) = query
            && self.frames.get(n).is_some_and(|f| f.complete)
        {
            return Ok(());
        }

        loop {
            let consumed = self.need;
            let Some(bytes) = source.get(self.pos, consumed) else {
                return Ok(());
            };
            let mut stop_after = false;

            match self.state {
                State::Lzw => {
                    let block = LzwBlock {
                        position: self.pos,
                        len: consumed,
                    };
                    if let Some(frame) = self.frames.last_mut() {
                        frame.blocks.push(block);
                    }
                    self.goto(1, State::SubBlock);
                }

                State::LzwStart => {
                    let data_size = bytes[0];
                    let Some(i) = self.frames.len().checked_sub(1) else {
                        return Err(self.fail("image data without a descriptor"));
                    };
                    self.set_required_frame(i);
                    self.frames[i].data_size = Some(data_size);
                    self.goto(1, State::SubBlock);
                }

                State::Type => {
                    if bytes != b"GIF89a" && bytes != b"GIF87a" {
                        return Err(self.fail("missing GIF87a/GIF89a signature"));
                    }
                    self.goto(7, State::GlobalHeader);
                }

                State::GlobalHeader => {
                    // The screen size may still grow to fit the first frame.
                    self.screen_width = u32::from(u16_le(bytes, 0).unwrap_or(0));
                    self.screen_height = u32::from(u16_le(bytes, 2).unwrap_or(0));
                    let colors = 2usize << (bytes[4] & 0x07);
                    if bytes[4] & 0x80 != 0 {
                        self.global_map.colors = colors;
                        self.goto(BYTES_PER_COLORMAP_ENTRY * colors, State::GlobalColormap);
                    } else {
                        self.goto(1, State::ImageStart);
                    }
                }

                State::GlobalColormap => {
                    self.global_map.position = Some(self.pos);
                    self.goto(1, State::ImageStart);
                }

                State::ImageStart => match bytes[0] {
                    b'!' => self.goto(2, State::Extension),
                    b',' => self.goto(9, State::ImageHeader),
                    b';' => self.goto(0, State::Done),
                    other => {
                        // Treat stray bytes as the end of the stream so the
                        // frames before them still display.
                        log::warn!(
                            "gif: unexpected byte {other:#04x} at {}, ending the stream",
                            self.pos
                        );
                        self.goto(0, State::Done);
                    }
                },

                State::Extension => {
                    let mut len = usize::from(bytes[1]);
                    let next = match bytes[0] {
                        0xf9 => {
                            // The control extension is always read as 4 bytes;
                            // longer blocks are allowed and the rest ignored.
                            len = len.max(4);
                            State::ControlExtension
                        }
                        0xff => State::ApplicationExtension,
                        0xfe => State::ConsumeComment,
                        // Plain text and unknown extensions are skipped.
                        _ => State::SkipBlock,
                    };
                    if len > 0 {
                        self.goto(len, next);
                    } else {
                        self.goto(1, State::ImageStart);
                    }
                }

                State::ConsumeBlock => {
                    let len = usize::from(bytes[0]);
                    if len == 0 {
                        self.goto(1, State::ImageStart);
                    } else {
                        self.goto(len, State::SkipBlock);
                    }
                }

                State::SkipBlock => self.goto(1, State::ConsumeBlock),

                State::ControlExtension => {
                    let flags = bytes[0];
                    let delay = u16_le(bytes, 1).unwrap_or(0);
                    let transparent = bytes[3];
                    self.add_frame_if_necessary();
                    if let Some(frame) = self.frames.last_mut() {
                        if flags & 0x01 != 0 {
                            frame.transparent = Some(usize::from(transparent));
                        }
                        frame.disposal = DisposalMethod::from_raw((flags >> 2) & 0x07);
                        frame.duration_ms = u32::from(delay) * 10;
                    }
                    self.goto(1, State::ConsumeBlock);
                }

                State::CommentExtension => {
                    let len = usize::from(bytes[0]);
                    if len > 0 {
                        self.goto(len, State::ConsumeComment);
                    } else {
                        self.goto(1, State::ImageStart);
                    }
                }

                State::ConsumeComment => self.goto(1, State::CommentExtension),

                State::ApplicationExtension => {
                    if consumed == 11 && (bytes == b"NETSCAPE2.0" || bytes == b"ANIMEXTS1.0") {
                        self.goto(1, State::NetscapeExtensionBlock);
                    } else {
                        self.goto(1, State::ConsumeBlock);
                    }
                }

                State::NetscapeExtensionBlock => {
                    let len = usize::from(bytes[0]);
                    if len > 0 {
                        // The loop count needs 3 bytes even if the block claims fewer.
                        self.goto(len.max(3), State::ConsumeNetscapeExtension);
                    } else {
                        self.goto(1, State::ImageStart);
                    }
                }

                State::ConsumeNetscapeExtension => match bytes[0] & 0x07 {
                    1 => {
                        let count = u16_le(bytes, 1).unwrap_or(0);
                        self.loop_count = Some(match count {
                            0 => Repetitions::Infinite,
                            n => Repetitions::Finite(n),
                        });
                        self.goto(1, State::NetscapeExtensionBlock);
                        stop_after = query == Query::LoopCount;
                    }
                    // Buffering hint; nothing to do.
                    2 => self.goto(1, State::NetscapeExtensionBlock),
                    other => {
                        return Err(self.fail(&alloc::format!(
                            "unknown netscape extension code {other}"
                        )));
                    }
                },

                State::ImageHeader => {
                    let x = u32::from(u16_le(bytes, 0).unwrap_or(0));
                    let y = u32::from(u16_le(bytes, 2).unwrap_or(0));
                    let mut width = u32::from(u16_le(bytes, 4).unwrap_or(0));
                    let mut height = u32::from(u16_le(bytes, 6).unwrap_or(0));
                    let flags = bytes[8];
                    let is_first = self.current_frame_is_first_frame();

                    // Only the first frame may enlarge the screen; later
                    // frames are cropped to it.
                    if is_first {
                        self.screen_width = self.screen_width.max(x + width);
                        self.screen_height = self.screen_height.max(y + height);
                    }

                    if width == 0 || height == 0 {
                        width = self.screen_width;
                        height = self.screen_height;
                        if width == 0 || height == 0 {
                            return Err(self.fail("frame and screen are both empty"));
                        }
                    }

                    let has_local_map = flags & 0x80 != 0;
                    let local_colors = 2usize << (flags & 0x07);
                    if is_first {
                        self.first_frame_has_alpha =
                            if self.has_transparent_pixel(0, has_local_map, local_colors) {
                                true
                            } else {
                                x > 0
                                    || y > 0
                                    || x + width < self.screen_width
                                    || y + height < self.screen_height
                            };
                    }

                    self.add_frame_if_necessary();
                    if let Some(frame) = self.frames.last_mut() {
                        frame.header_defined = true;
                        frame.rect = FrameRect {
                            x,
                            y,
                            width,
                            height,
                        };
                        frame.interlaced = flags & 0x40 != 0;
                        frame.progressive = is_first;
                        if has_local_map {
                            frame.local_map.colors = local_colors;
                        }
                    }
                    if has_local_map {
                        self.goto(BYTES_PER_COLORMAP_ENTRY * local_colors, State::ImageColormap);
                    } else {
                        self.goto(1, State::LzwStart);
                    }
                    stop_after = query == Query::Size;
                }

                State::ImageColormap => {
                    let pos = self.pos;
                    if let Some(frame) = self.frames.last_mut() {
                        frame.local_map.position = Some(pos);
                    }
                    self.goto(1, State::LzwStart);
                }

                State::SubBlock => {
                    let len = usize::from(bytes[0]);
                    if len > 0 {
                        self.goto(len, State::Lzw);
                    } else {
                        // Frames with too little data still end here, and
                        // count as complete.
                        if let Some(frame) = self.frames.last_mut() {
                            frame.complete = true;
                        }
                        self.goto(1, State::ImageStart);
                        if let Query::Frame(n) = query {
                            stop_after = self.frames.len() > n;
                        }
                    }
                }

                State::Done => {
                    self.parse_completed = true;
                    return Ok(());
                }
            }

            self.pos += consumed;
            if stop_after {
                return Ok(());
            }
        }
    }

    /// Color table for frame `index`: its local map if it has one, else the
    /// global map. `None` when the frame has no color map at all.
    pub(crate) fn color_table(
        &mut self,
        source: &SourceBuffer,
        index: usize,
        pack: PackKind,
    ) -> Option<Rc<ColorTable>> {
        let transparent = self.frames.get(index)?.transparent;
        let local = &mut self.frames[index].local_map;
        if local.is_defined() {
            return local.build_table(source, pack, transparent);
        }
        self.global_map.build_table(source, pack, transparent)
    }

    /// Whether frame `i` can show transparency through its color map.
    ///
    /// A frame without any color map draws nothing, which counts as
    /// transparent.
    fn has_transparent_pixel(&self, i: usize, has_local_map: bool, local_colors: usize) -> bool {
        let Some(frame) = self.frames.get(i) else {
            // No control extension was seen, so only a missing map can
            // make the first frame transparent.
            return !has_local_map && self.global_map.colors == 0;
        };
        let transparent = frame.transparent.unwrap_or(usize::MAX);
        if has_local_map {
            return transparent < local_colors;
        }
        let global_colors = self.global_map.colors;
        global_colors == 0 || transparent < global_colors
    }

    /// Decide which earlier frame frame `i` is drawn on top of, and whether
    /// the result can carry alpha.
    fn set_required_frame(&mut self, i: usize) {
        let local_map = &self.frames[i].local_map;
        let trans_valid = self.has_transparent_pixel(i, local_map.is_defined(), local_map.colors);
        let rect = self.frames[i].rect;
        let covers_screen = rect.contains(&FrameRect {
            x: 0,
            y: 0,
            width: self.screen_width,
            height: self.screen_height,
        });

        let required = if i == 0 {
            None
        } else {
            let prev = &self.frames[i - 1];
            if prev.disposal == DisposalMethod::RestorePrevious {
                prev.required_frame
            } else if !trans_valid && rect.contains(&prev.rect) {
                prev.required_frame
            } else {
                match prev.disposal {
                    DisposalMethod::RestoreBgColor
                        if prev.rect.is_screen(self.screen_width, self.screen_height)
                            || prev.required_frame.is_none() =>
                    {
                        None
                    }
                    _ => Some(i - 1),
                }
            }
        };

        let required_alpha = required.is_some_and(|r| self.frames[r].has_alpha);
        let frame = &mut self.frames[i];
        frame.required_frame = required;
        frame.has_alpha = trans_valid || !covers_screen || required_alpha;
    }
}
