//! Per-frame state gathered while parsing, and color maps.

use alloc::rc::Rc;
use alloc::vec::Vec;

use crate::color::{ColorTable, PackKind};
use crate::stream::SourceBuffer;

pub(crate) const MAX_COLORS: usize = 256;
const BYTES_PER_COLORMAP_ENTRY: usize = 3;

/// What happens to a frame's area before the next frame is drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DisposalMethod {
    /// Leave the frame in place.
    #[default]
    Keep,
    /// Clear the frame's rectangle to the background.
    RestoreBgColor,
    /// Restore what was there before the frame was drawn.
    RestorePrevious,
}

impl DisposalMethod {
    /// Map the 3-bit field of a graphic control extension.
    ///
    /// Code 4 is written by some encoders for "restore previous" and is
    /// read as such. Unknown codes keep the frame.
    pub(crate) fn from_raw(raw: u8) -> Self {
        match raw {
            2 => Self::RestoreBgColor,
            3 | 4 => Self::RestorePrevious,
            _ => Self::Keep,
        }
    }
}

/// A frame's position and size on the logical screen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FrameRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FrameRect {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether `other` lies entirely inside this rectangle.
    pub fn contains(&self, other: &FrameRect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x <= other.x
            && self.y <= other.y
            && self.right() >= other.right()
            && self.bottom() >= other.bottom()
    }

    /// Whether this rectangle is exactly the `width` x `height` screen.
    pub fn is_screen(&self, width: u32, height: u32) -> bool {
        self.x == 0 && self.y == 0 && self.width == width && self.height == height
    }
}

/// A global or local color map: where its RGB triples live in the input,
/// plus the last table built from it.
#[derive(Clone, Debug, Default)]
pub(crate) struct ColorMap {
    pub colors: usize,
    pub position: Option<usize>,
    cache: Option<(PackKind, Option<usize>, Rc<ColorTable>)>,
}

impl ColorMap {
    pub(crate) fn is_defined(&self) -> bool {
        self.position.is_some()
    }

    /// A 256-entry table packed with `pack`. The transparent index and
    /// entries past the map's end are fully transparent.
    ///
    /// Tables are reused while the packing and transparent index match.
    pub(crate) fn build_table(
        &mut self,
        source: &SourceBuffer,
        pack: PackKind,
        transparent: Option<usize>,
    ) -> Option<Rc<ColorTable>> {
        let position = self.position?;
        if let Some((cached_pack, cached_transparent, table)) = &self.cache
            && *cached_pack == pack
            && *cached_transparent == transparent
        {
            return Some(Rc::clone(table));
        }

        let raw = source.get(position, self.colors * BYTES_PER_COLORMAP_ENTRY)?;
        let mut table = ColorTable::new();
        for (i, rgb) in raw.chunks_exact(BYTES_PER_COLORMAP_ENTRY).enumerate() {
            if Some(i) == transparent {
                table.push([0; 4]);
            } else {
                table.push(pack.pack(rgb[0], rgb[1], rgb[2], 0xff));
            }
        }
        table.pad_to(MAX_COLORS, [0; 4]);
        let table = Rc::new(table);
        self.cache = Some((pack, transparent, Rc::clone(&table)));
        Some(table)
    }
}

/// One LZW data sub-block: absolute position and length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct LzwBlock {
    pub position: usize,
    pub len: usize,
}

/// Everything known about one frame.
///
/// Frames are created by a graphic control extension or an image
/// descriptor, and filled in as the rest of their blocks are parsed.
#[derive(Clone, Debug, Default)]
pub(crate) struct FrameContext {
    pub id: usize,
    pub rect: FrameRect,
    pub interlaced: bool,
    /// Only the first frame is shown while interlace passes stream in.
    pub progressive: bool,
    pub disposal: DisposalMethod,
    pub duration_ms: u32,
    pub transparent: Option<usize>,
    pub local_map: ColorMap,
    pub data_size: Option<u8>,
    pub header_defined: bool,
    pub complete: bool,
    pub blocks: Vec<LzwBlock>,
    pub required_frame: Option<usize>,
    pub has_alpha: bool,
}

impl FrameContext {
    pub(crate) fn new(id: usize) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// The image descriptor and the LZW minimum code size have both been
    /// read, so decoding can begin.
    pub(crate) fn reached_start_of_data(&self) -> bool {
        self.header_defined && self.data_size.is_some()
    }
}
