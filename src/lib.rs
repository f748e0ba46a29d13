//! # zenclassic
//!
//! Streaming decoders for the classic raster formats: BMP, ICO/CUR and GIF.
//!
//! Every decoder accepts input that is still arriving. A decode that runs out
//! of bytes returns [`CodecError::IncompleteInput`] with the number of rows
//! already written; push the rest of the data and call again to resume where
//! it stopped. Corrupt data after some valid rows gives
//! [`CodecError::ErrorInInput`], again with the rows that are usable.
//!
//! ## Supported Formats
//!
//! ### BMP (`bmp` feature)
//! - Windows V1-V5 and OS/2 headers, top-down and bottom-up rows
//! - 1, 2, 4 and 8-bit palettes, 24 and 32-bit truecolor
//! - 16, 24 and 32-bit bit-field images with any contiguous channel masks
//! - RLE4, RLE8 and RLE24 compression, including delta and end-of-line escapes
//!
//! ### ICO/CUR (`ico` feature)
//! - BMP entries with AND transparency masks; the largest entry is the default
//!
//! ### GIF (`gif` feature)
//! - GIF87a and GIF89a, interlaced frames, transparency
//! - Animation: frame info, disposal methods, loop count and frame compositing
//!
//! ## Output
//!
//! Pixels are written as [`PixelLayout::Rgba8`], [`PixelLayout::Bgra8`] or,
//! for palette BMPs, [`PixelLayout::Index8`] together with the image's
//! [`ColorTable`]. Alpha can be unpremultiplied, premultiplied or, for
//! sources without transparency, opaque. A sample size shrinks the output by
//! keeping every `n`th row and column.
//!
//! ## Non-Goals
//!
//! - Encoding
//! - Color management and embedded ICC profiles
//! - PNG or JPEG payloads inside BMP and ICO files
//!
//! ## Usage
//!
//! ```no_run
//! use zenclassic::{DecodeOptions, DecodeRequest, PixelLayout, Status, Unstoppable};
//!
//! let data: &[u8] = &[]; // your BMP, ICO or GIF bytes
//!
//! let decoded = DecodeRequest::new(data)
//!     .with_options(DecodeOptions::new(PixelLayout::Rgba8))
//!     .decode(Unstoppable)?;
//! if decoded.status != Status::Success {
//!     println!("partial image: {} rows decoded", decoded.rows_decoded);
//! }
//! println!("{}x{}", decoded.width, decoded.height);
//! # Ok::<(), zenclassic::CodecError>(())
//! ```
//!
//! Streaming:
//!
//! ```no_run
//! use zenclassic::{CodecError, DecodeOptions, Unstoppable};
//!
//! # fn main() -> Result<(), CodecError> {
//! let first_chunk: &[u8] = &[];
//! let rest: &[u8] = &[];
//! let mut codec = zenclassic::open(first_chunk, None)?;
//! let info = codec.info();
//! let stride = info.width as usize * 4;
//! let mut pixels = vec![0u8; stride * info.height as usize];
//! codec.start_decode(&DecodeOptions::default())?;
//! match codec.incremental_decode(&mut pixels, stride, &Unstoppable) {
//!     Err(CodecError::IncompleteInput { .. }) => {
//!         codec.push(rest);
//!         codec.incremental_decode(&mut pixels, stride, &Unstoppable)?;
//!     }
//!     other => {
//!         other?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

mod bytes;
mod color;
mod error;
mod info;
mod limits;
mod pixel;
mod stream;
mod swizzle;

#[cfg(feature = "bmp")]
pub mod bmp;

#[cfg(feature = "ico")]
pub mod ico;

#[cfg(feature = "gif")]
pub mod gif;

mod decode;

// Re-exports
pub use color::ColorTable;
pub use decode::{Codec, DecodeOptions, DecodeOutput, DecodeRequest, open};
pub use enough::{Stop, Unstoppable};
pub use error::{CodecError, Status};
pub use info::{ImageFormat, ImageInfo};
pub use limits::Limits;
#[cfg(feature = "rgb")]
pub use pixel::DecodePixel;
pub use pixel::{AlphaMode, PixelLayout};
pub use swizzle::masks::{BitMaskSet, InputMasks, MaskInfo};

#[cfg(feature = "bmp")]
pub use bmp::{BmpDecoder, HeaderType};
#[cfg(feature = "gif")]
pub use gif::{DisposalMethod, FrameInfo, FrameOptions, FrameRect, GifDecoder, Repetitions};
#[cfg(feature = "ico")]
pub use ico::IcoDecoder;
