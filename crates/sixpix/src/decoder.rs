//! Streaming SIXEL decoder: a byte-level state machine over the DCS payload
//! that reconstructs an RGBA pixel buffer on a growable canvas.

use tracing::debug;

use crate::color::SixelColor;
use crate::{
    parse_error, ParseErrorKind, Result, SIXEL_HEIGHT_LIMIT, SIXEL_PALETTE_MAX, SIXEL_WIDTH_LIMIT,
};

const SIXEL_CELL_HEIGHT: usize = 6;
const MAX_REPEAT: usize = 0xffff;
const INITIAL_CANVAS_SIZE: usize = 200;
// Undeclared regions of the canvas read back as opaque white.
const BACKGROUND: [u8; 4] = [0xff, 0xff, 0xff, 0xff];
// Max 256 MB of pixel data (64 million pixels * 4 bytes)
const MAX_PIXELS: usize = 64 * 1024 * 1024;

/// A decoded SIXEL image.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    /// RGBA pixel data (4 bytes per pixel: R, G, B, A)
    pub pixels: Vec<u8>,
    /// Image width in pixels
    pub width: usize,
    /// Image height in pixels
    pub height: usize,
}

/// Decodes a complete SIXEL sequence.
///
/// The input must carry the full DCS envelope:
/// ```text
/// ESC P <prefix> q <sixel_data> ESC \
/// ```
/// Anything between `ESC P` and `q` is skipped. The working canvas grows by
/// doubling as `-` and data characters move past its edges, and the final
/// image is cropped to the tight bounding box the stream actually touched.
///
/// # Errors
///
/// Any unexpected byte, an undefined palette reference, or a truncated
/// stream fails with [`crate::SixelError::Parse`] carrying the byte offset. No
/// partial image is returned.
///
/// # Example
///
/// ```rust
/// use sixpix::sixel_decode;
///
/// let sixel_data = b"\x1bPq#0;2;100;0;0#0~~~\x1b\\";
/// let image = sixel_decode(sixel_data)?;
/// assert_eq!((image.width, image.height), (3, 6));
/// # Ok::<(), sixpix::SixelError>(())
/// ```
#[must_use = "this returns the decoded image"]
pub fn sixel_decode(data: &[u8]) -> Result<DecodedImage> {
    SixelDecoder::new().run(data)
}

struct SixelDecoder {
    canvas: Canvas,
    palette: Vec<Option<[u8; 4]>>,
    color_index: Option<usize>,
    repeat: usize,
    pos_x: usize,
    pos_y: usize,
    /// Rightmost column the cursor moved past.
    width: usize,
    /// One past the lowest row a bit was painted on.
    height: usize,
}

impl SixelDecoder {
    fn new() -> Self {
        Self {
            canvas: Canvas::new(INITIAL_CANVAS_SIZE, INITIAL_CANVAS_SIZE),
            palette: vec![None; SIXEL_PALETTE_MAX],
            color_index: None,
            repeat: 1,
            pos_x: 0,
            pos_y: 0,
            width: 0,
            height: 0,
        }
    }

    fn run(mut self, data: &[u8]) -> Result<DecodedImage> {
        if data.len() < 2 || data[0] != 0x1b || data[1] != b'P' {
            return Err(parse_error(0, ParseErrorKind::MissingIntroducer));
        }

        // Skip the device-control prefix up to and including 'q'.
        let mut idx = 2;
        loop {
            if idx >= data.len() {
                return Err(parse_error(idx, ParseErrorKind::UnexpectedEof));
            }
            let byte = data[idx];
            idx += 1;
            if byte == b'q' {
                break;
            }
        }

        while idx < data.len() {
            match data[idx] {
                b'\n' | b'\r' => idx += 1,
                0x1b => {
                    if idx + 1 >= data.len() {
                        return Err(parse_error(data.len(), ParseErrorKind::UnexpectedEof));
                    }
                    if data[idx + 1] == b'\\' {
                        return self.finish();
                    }
                    return Err(parse_error(
                        idx + 1,
                        ParseErrorKind::UnexpectedByte(data[idx + 1]),
                    ));
                }
                b'!' => {
                    let (value, next) = read_number(data, idx + 1);
                    let value =
                        value.ok_or_else(|| parse_error(idx + 1, ParseErrorKind::ExpectedNumber))?;
                    if value > MAX_REPEAT {
                        return Err(parse_error(idx + 1, ParseErrorKind::RepeatTooLarge(value)));
                    }
                    self.repeat = value.max(1);
                    idx = next;
                }
                b'"' => idx = self.handle_raster_attributes(data, idx + 1)?,
                b'#' => idx = self.handle_color_introducer(data, idx + 1)?,
                b'$' => {
                    self.pos_x = 0;
                    idx += 1;
                }
                b'-' => {
                    self.pos_x = 0;
                    self.pos_y += SIXEL_CELL_HEIGHT;
                    self.grow_height(self.pos_y + SIXEL_CELL_HEIGHT, idx)?;
                    idx += 1;
                }
                byte @ 0x3f..=0x7e => {
                    self.paint(byte - 0x3f, idx)?;
                    idx += 1;
                }
                byte => return Err(parse_error(idx, ParseErrorKind::UnexpectedByte(byte))),
            }
        }

        Err(parse_error(data.len(), ParseErrorKind::UnexpectedEof))
    }

    /// `"Pan;Pad;Ph;Pv` - aspect ratio is accepted but unused, the third and
    /// fourth parameters size the canvas.
    fn handle_raster_attributes(&mut self, data: &[u8], mut idx: usize) -> Result<usize> {
        let start = idx;
        let mut params = [0usize; 4];
        let mut count = 0;
        loop {
            let (value, next) = read_number(data, idx);
            let value = value.ok_or_else(|| parse_error(idx, ParseErrorKind::ExpectedNumber))?;
            if count < params.len() {
                params[count] = value;
            }
            count += 1;
            idx = next;
            if idx < data.len() && data[idx] == b';' {
                idx += 1;
            } else {
                break;
            }
        }
        if count < 4 {
            return Err(parse_error(start, ParseErrorKind::InvalidRasterAttributes));
        }

        let (width, height) = (params[2], params[3]);
        if width > SIXEL_WIDTH_LIMIT
            || height > SIXEL_HEIGHT_LIMIT
            || width.saturating_mul(height) > MAX_PIXELS
        {
            return Err(parse_error(start, ParseErrorKind::DimensionsTooLarge));
        }
        if width > 0 && height > 0 {
            debug!(width, height, "raster attributes resize");
            self.canvas.ensure(width, height);
        }
        Ok(idx)
    }

    /// `#n` selects a drawing color, `#n;cSys;c1;c2;c3` (re)defines the slot.
    fn handle_color_introducer(&mut self, data: &[u8], idx: usize) -> Result<usize> {
        let (slot, mut idx) = read_number(data, idx);
        let slot = slot.ok_or_else(|| parse_error(idx, ParseErrorKind::ExpectedNumber))?;
        if slot >= SIXEL_PALETTE_MAX {
            return Err(parse_error(idx, ParseErrorKind::PaletteIndexOutOfRange(slot)));
        }
        self.color_index = Some(slot);

        if idx >= data.len() || data[idx] != b';' {
            return Ok(idx);
        }

        let mut params = [0usize; 4];
        for (i, param) in params.iter_mut().enumerate() {
            if i > 0 && (idx >= data.len() || data[idx] != b';') {
                return Err(parse_error(idx, ParseErrorKind::ExpectedNumber));
            }
            idx += 1; // the ';'
            let (value, next) = read_number(data, idx);
            *param = value.ok_or_else(|| parse_error(idx, ParseErrorKind::ExpectedNumber))?;
            idx = next;
        }
        let [system, c1, c2, c3] = params;

        let color = match system {
            1 => {
                if c1 > 360 || c2 > 100 || c3 > 100 {
                    let bad = c1.max(c2).max(c3);
                    return Err(parse_error(idx, ParseErrorKind::ColorOutOfRange(bad)));
                }
                SixelColor::from_hls(c1 as i32, c2 as i32, c3 as i32)
            }
            2 => {
                if c1 > 100 || c2 > 100 || c3 > 100 {
                    let bad = c1.max(c2).max(c3);
                    return Err(parse_error(idx, ParseErrorKind::ColorOutOfRange(bad)));
                }
                SixelColor::new(c1 as u8, c2 as u8, c3 as u8, 100)
            }
            other => {
                return Err(parse_error(idx, ParseErrorKind::InvalidColorSystem(other)));
            }
        }
        .map_err(|_| parse_error(idx, ParseErrorKind::ColorOutOfRange(c1.max(c2).max(c3))))?;

        self.palette[slot] = Some(color.to_rgba8());
        Ok(idx)
    }

    /// Paints one sixel data character: a 6-bit column repeated over
    /// `self.repeat` columns.
    fn paint(&mut self, bits: u8, offset: usize) -> Result<()> {
        let span = self.repeat;
        self.repeat = 1;

        let needed = self
            .pos_x
            .checked_add(span)
            .ok_or_else(|| parse_error(offset, ParseErrorKind::DimensionsTooLarge))?;
        self.grow_width(needed, offset)?;

        if bits != 0 {
            let slot = self
                .color_index
                .ok_or_else(|| parse_error(offset, ParseErrorKind::NoColorSelected))?;
            let color = self.palette[slot]
                .ok_or_else(|| parse_error(offset, ParseErrorKind::UndefinedPaletteSlot(slot)))?;

            for p in 0..SIXEL_CELL_HEIGHT {
                if bits & (1 << p) != 0 {
                    let y = self.pos_y + p;
                    self.canvas.paint_span(y, self.pos_x, span, color);
                    self.height = self.height.max(y + 1);
                }
            }
        }

        self.pos_x = needed;
        self.width = self.width.max(self.pos_x);
        Ok(())
    }

    fn grow_width(&mut self, needed: usize, offset: usize) -> Result<()> {
        let mut width = self.canvas.width;
        while width < needed {
            width *= 2;
        }
        if width > SIXEL_WIDTH_LIMIT || width.saturating_mul(self.canvas.height) > MAX_PIXELS {
            return Err(parse_error(offset, ParseErrorKind::DimensionsTooLarge));
        }
        if width != self.canvas.width {
            debug!(width, "growing canvas width");
            self.canvas.ensure(width, self.canvas.height);
        }
        Ok(())
    }

    fn grow_height(&mut self, needed: usize, offset: usize) -> Result<()> {
        let mut height = self.canvas.height;
        while height < needed {
            height *= 2;
        }
        if height > SIXEL_HEIGHT_LIMIT || height.saturating_mul(self.canvas.width) > MAX_PIXELS {
            return Err(parse_error(offset, ParseErrorKind::DimensionsTooLarge));
        }
        if height != self.canvas.height {
            debug!(height, "growing canvas height");
            self.canvas.ensure(self.canvas.width, height);
        }
        Ok(())
    }

    /// Crops the working canvas to the tight bounding box the stream drew.
    fn finish(self) -> Result<DecodedImage> {
        let (width, height) = (self.width, self.height);
        if width == 0 || height == 0 {
            return Ok(DecodedImage {
                pixels: Vec::new(),
                width: 0,
                height: 0,
            });
        }
        debug!(
            from_width = self.canvas.width,
            from_height = self.canvas.height,
            width,
            height,
            "cropping canvas"
        );
        let pixels = self.canvas.crop(width, height);
        Ok(DecodedImage {
            pixels,
            width,
            height,
        })
    }
}

/// Arena-backed pixel buffer addressed by (x, y) with resize that preserves
/// already-painted content.
struct Canvas {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl Canvas {
    fn new(width: usize, height: usize) -> Self {
        let mut data = vec![0u8; width * height * 4];
        fill_rgba_span(&mut data, BACKGROUND);
        Self {
            data,
            width,
            height,
        }
    }

    /// Grows the canvas to cover at least `width` x `height`, background
    /// filling the new area. Never shrinks.
    fn ensure(&mut self, width: usize, height: usize) {
        if width <= self.width && height <= self.height {
            return;
        }
        let new_width = width.max(self.width);
        let new_height = height.max(self.height);
        let mut new_data = vec![0u8; new_width * new_height * 4];

        for row in 0..self.height {
            let src_start = row * self.width * 4;
            let dst_start = row * new_width * 4;
            new_data[dst_start..dst_start + self.width * 4]
                .copy_from_slice(&self.data[src_start..src_start + self.width * 4]);
            if new_width > self.width {
                let span = &mut new_data[dst_start + self.width * 4..dst_start + new_width * 4];
                fill_rgba_span(span, BACKGROUND);
            }
        }
        for row in self.height..new_height {
            let dst_start = row * new_width * 4;
            fill_rgba_span(&mut new_data[dst_start..dst_start + new_width * 4], BACKGROUND);
        }

        self.data = new_data;
        self.width = new_width;
        self.height = new_height;
    }

    #[inline]
    fn paint_span(&mut self, y: usize, x: usize, len: usize, color: [u8; 4]) {
        if len == 0 || y >= self.height || x >= self.width {
            return;
        }
        let len = len.min(self.width - x);
        let start = (y * self.width + x) * 4;
        fill_rgba_span(&mut self.data[start..start + len * 4], color);
    }

    fn crop(&self, width: usize, height: usize) -> Vec<u8> {
        let mut out = vec![0u8; width * height * 4];
        for row in 0..height {
            let src_start = (row * self.width) * 4;
            let dst_start = row * width * 4;
            out[dst_start..dst_start + width * 4]
                .copy_from_slice(&self.data[src_start..src_start + width * 4]);
        }
        out
    }
}

fn fill_rgba_span(buf: &mut [u8], color: [u8; 4]) {
    for chunk in buf.chunks_exact_mut(4) {
        chunk.copy_from_slice(&color);
    }
}

/// Greedy decimal parse: returns the value (None if no digits) and the index
/// of the first non-digit, which stays unconsumed for the caller.
fn read_number(data: &[u8], mut idx: usize) -> (Option<usize>, usize) {
    let start = idx;
    let mut value = 0usize;
    while idx < data.len() && data[idx].is_ascii_digit() {
        value = value
            .saturating_mul(10)
            .saturating_add((data[idx] - b'0') as usize);
        idx += 1;
    }
    (if idx > start { Some(value) } else { None }, idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_number_stops_at_first_non_digit() {
        let data = b"123;45";
        assert_eq!(read_number(data, 0), (Some(123), 3));
        assert_eq!(read_number(data, 3), (None, 3));
        assert_eq!(read_number(data, 4), (Some(45), 6));
    }

    #[test]
    fn canvas_growth_preserves_content() {
        let mut canvas = Canvas::new(2, 2);
        canvas.paint_span(0, 0, 2, [1, 2, 3, 4]);
        canvas.ensure(4, 4);
        assert_eq!(canvas.width, 4);
        assert_eq!(canvas.height, 4);
        assert_eq!(&canvas.data[0..4], &[1, 2, 3, 4]);
        assert_eq!(&canvas.data[8..12], &BACKGROUND);
    }
}
