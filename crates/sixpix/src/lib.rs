//! # sixpix
//!
//! A 100% Rust SIXEL library for encoding and decoding SIXEL graphics,
//! including a paced animation pipeline for multi-frame images.
//!
//! ## Quick Start
//!
//! ### Encoding an image to SIXEL
//!
//! ```ignore
//! use sixpix::{sixel_encode, EncodeOptions};
//!
//! // RGBA image data (4 bytes per pixel)
//! let rgba = vec![255u8, 0, 0, 255, 0, 255, 0, 255]; // red and green pixels
//! let sixel = sixel_encode(&rgba, 2, 1, &EncodeOptions::default())?;
//! print!("{}", sixel);
//! ```
//!
//! ### Decoding SIXEL to image data
//!
//! ```ignore
//! use sixpix::sixel_decode;
//!
//! let sixel_data = b"\x1bPq#0;2;100;0;0#0~\x1b\\";
//! let image = sixel_decode(sixel_data)?;
//! // image.pixels contains RGBA pixel data (4 bytes per pixel)
//! println!("{}x{}", image.width, image.height);
//! ```

use thiserror::Error;

pub mod animation;
pub mod color;
pub mod decoder;
pub mod encoder;
pub mod palette;
pub mod terminal;

pub use animation::{
    encode_frames, play, Animation, Frame, FrameMetadata, FrameStream, FrameWindow, PlayOptions,
};
pub use color::SixelColor;
pub use decoder::{sixel_decode, DecodedImage};
pub use encoder::{encode_frame, sixel_encode, sixel_encode_default, EncodeOptions};
pub use palette::{Palette, PaletteEntry, TransparencyMode};
pub use terminal::{CapabilityProbe, Extent, StaticCapabilities, TerminalCapabilities};

/// Errors that can occur during SIXEL encoding, decoding or playback.
#[derive(Debug, Error)]
pub enum SixelError {
    /// Invalid image dimensions (width or height is zero or too large)
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    /// Buffer size doesn't match expected size for dimensions
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// A color channel outside the 0-100 SIXEL scale
    #[error("{channel} channel out of range: {value} (expected 0-100)")]
    ChannelOutOfRange { channel: &'static str, value: i64 },

    /// More palette entries than the SIXEL introducer space can address
    #[error("palette has {0} entries, SIXEL addresses at most {SIXEL_PALETTE_MAX}")]
    PaletteOverflow(usize),

    /// A pixel whose color is not present in the supplied palette
    #[error("pixel at ({x}, {y}) has no palette entry")]
    ColorNotInPalette { x: usize, y: usize },

    /// Malformed SIXEL data, with the byte offset where parsing stopped
    #[error("parse error at byte {offset}: {kind}")]
    Parse { offset: usize, kind: ParseErrorKind },

    /// Operation incompatible with the source image or its format
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Playback interrupted through the cancellation signal
    #[error("playback cancelled")]
    Cancelled,

    /// Color quantization failed
    #[error("quantization error: {0}")]
    Quantization(String),

    /// The background encode task failed outside of normal error flow
    #[error("frame pipeline failed: {0}")]
    Pipeline(String),

    /// Writing to the playback sink failed
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Detail for [`SixelError::Parse`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("missing DCS introducer (expected ESC 'P')")]
    MissingIntroducer,
    #[error("unexpected byte 0x{0:02x}")]
    UnexpectedByte(u8),
    #[error("unexpected end of stream")]
    UnexpectedEof,
    #[error("expected a decimal number")]
    ExpectedNumber,
    #[error("raster attributes need at least 4 parameters")]
    InvalidRasterAttributes,
    #[error("color system must be 1 (HLS) or 2 (RGB), got {0}")]
    InvalidColorSystem(usize),
    #[error("color value {0} out of range")]
    ColorOutOfRange(usize),
    #[error("palette slot {0} out of range")]
    PaletteIndexOutOfRange(usize),
    #[error("palette slot {0} referenced before definition")]
    UndefinedPaletteSlot(usize),
    #[error("sixel data before any color was selected")]
    NoColorSelected,
    #[error("repeat count {0} too large")]
    RepeatTooLarge(usize),
    #[error("image dimensions too large")]
    DimensionsTooLarge,
}

/// Result type for SIXEL operations.
pub type Result<T> = core::result::Result<T, SixelError>;

pub(crate) const SIXEL_PALETTE_MAX: usize = 256;
pub(crate) const SIXEL_WIDTH_LIMIT: usize = 1000000;
pub(crate) const SIXEL_HEIGHT_LIMIT: usize = 1000000;

/// An owned RGBA bitmap, the unit of work for the encoder.
///
/// The pixel buffer is row-major with 4 bytes per pixel (R, G, B, A).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    pixels: Vec<u8>,
    width: usize,
    height: usize,
}

impl Bitmap {
    /// Wraps an RGBA buffer, validating that its length matches the dimensions.
    pub fn new(pixels: Vec<u8>, width: usize, height: usize) -> Result<Self> {
        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(4))
            .ok_or(SixelError::InvalidDimensions { width, height })?;
        if pixels.len() != expected {
            return Err(SixelError::BufferSizeMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            pixels,
            width,
            height,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Returns the RGBA bytes of the pixel at (x, y).
    ///
    /// # Panics
    /// Panics if (x, y) lies outside the bitmap.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let start = (y * self.width + x) * 4;
        [
            self.pixels[start],
            self.pixels[start + 1],
            self.pixels[start + 2],
            self.pixels[start + 3],
        ]
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }
}

pub(crate) fn parse_error(offset: usize, kind: ParseErrorKind) -> SixelError {
    SixelError::Parse { offset, kind }
}
