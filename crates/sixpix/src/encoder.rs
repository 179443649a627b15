//! SIXEL encoder: 6-row banding, per-color bit planes and run-length
//! compaction over an already-quantized bitmap, plus a quantizing
//! convenience entry point built on quantette.

use quantette::{
    deps::palette::Srgb, dither::FloydSteinberg, ImageRef, PaletteSize, Pipeline, QuantizeMethod,
};
use tracing::debug;

use crate::palette::{Palette, TransparencyMode};
use crate::{Bitmap, Result, SixelError, SIXEL_HEIGHT_LIMIT, SIXEL_PALETTE_MAX, SIXEL_WIDTH_LIMIT};

const SIXEL_CELL_HEIGHT: usize = 6;
const MAX_RUN: usize = 255;

/// Options for the quantizing [`sixel_encode`] entry point.
#[derive(Clone, Debug)]
pub struct EncodeOptions {
    /// Maximum number of colors in the palette (2-256).
    /// Fewer colors = smaller SIXEL output but less accurate colors.
    pub max_colors: u16,

    /// Which pixels become transparent on the wire.
    pub transparency: TransparencyMode,

    /// RGB of the container's transparent palette color, if any.
    pub transparent_color: Option<[u8; 3]>,

    /// RGB of the container's background color, if any.
    pub background_color: Option<[u8; 3]>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            max_colors: 256,
            transparency: TransparencyMode::Default,
            transparent_color: None,
            background_color: None,
        }
    }
}

/// Encode RGBA image data into a SIXEL string.
///
/// Quantizes with Wu's method plus Floyd-Steinberg dithering, builds the
/// palette under `opts.transparency`, then runs [`encode_frame`].
///
/// # Arguments
/// * `rgba` - Raw RGBA pixel data (4 bytes per pixel: R, G, B, A)
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
/// * `opts` - Encoding options
#[must_use = "this returns the encoded SIXEL string"]
pub fn sixel_encode(
    rgba: &[u8],
    width: usize,
    height: usize,
    opts: &EncodeOptions,
) -> Result<String> {
    if width == 0 || height == 0 {
        return Err(SixelError::InvalidDimensions { width, height });
    }
    let expected = width * height * 4;
    if rgba.len() != expected {
        return Err(SixelError::BufferSizeMismatch {
            expected,
            actual: rgba.len(),
        });
    }

    // SIXEL transparency is binary; pixels below half alpha drop out.
    let opacity_mask: Vec<bool> = rgba.chunks_exact(4).map(|c| c[3] >= 128).collect();
    let has_transparency = opts.transparency != TransparencyMode::None
        && opacity_mask.iter().any(|opaque| !opaque);

    let rgb_pixels: Vec<Srgb<u8>> = rgba
        .chunks_exact(4)
        .map(|c| Srgb::new(c[0], c[1], c[2]))
        .collect();

    // Leave one introducer slot for the transparent entry.
    let limit = if has_transparency { 255 } else { 256 };
    let max_colors = opts.max_colors.clamp(2, limit) as u8;
    let palette_size = PaletteSize::try_from(max_colors).unwrap_or(PaletteSize::MAX);

    let image = ImageRef::new(width as u32, height as u32, &rgb_pixels)
        .map_err(|e| SixelError::Quantization(e.to_string()))?;

    let indexed_image = Pipeline::new()
        .palette_size(palette_size)
        .quantize_method(QuantizeMethod::Wu)
        .ditherer(FloydSteinberg::new())
        .input_image(image)
        .output_srgb8_indexed_image();

    let quant_palette = indexed_image.palette().to_vec();
    let indices = indexed_image.indices();

    let mut quantized = Vec::with_capacity(expected);
    for (i, &index) in indices.iter().enumerate() {
        if opts.transparency != TransparencyMode::None && !opacity_mask[i] {
            quantized.extend_from_slice(&[0, 0, 0, 0]);
        } else {
            let c = quant_palette[index as usize];
            quantized.extend_from_slice(&[c.red, c.green, c.blue, 255]);
        }
    }

    let bitmap = Bitmap::new(quantized, width, height)?;
    let palette = Palette::from_bitmap(
        &bitmap,
        opts.transparency,
        opts.transparent_color,
        opts.background_color,
    );
    encode_frame(&bitmap, &palette, opts.transparency)
}

/// Encode RGBA with default options.
#[inline]
#[must_use = "this returns the encoded SIXEL string"]
pub fn sixel_encode_default(rgba: &[u8], width: usize, height: usize) -> Result<String> {
    sixel_encode(rgba, width, height, &EncodeOptions::default())
}

/// Encodes one quantized bitmap frame against its palette.
///
/// The palette must have been built from this bitmap (or a superset of its
/// colors) under the same transparency mode; a pixel without a palette entry
/// is an error rather than a guess. The output is deterministic: the same
/// inputs always produce the identical string.
#[must_use = "this returns the encoded SIXEL string"]
pub fn encode_frame(bitmap: &Bitmap, palette: &Palette, mode: TransparencyMode) -> Result<String> {
    let (width, height) = (bitmap.width(), bitmap.height());
    if width == 0 || height == 0 || width > SIXEL_WIDTH_LIMIT || height > SIXEL_HEIGHT_LIMIT {
        return Err(SixelError::InvalidDimensions { width, height });
    }
    if palette.len() > SIXEL_PALETTE_MAX {
        return Err(SixelError::PaletteOverflow(palette.len()));
    }

    debug!(width, height, colors = palette.len(), "encoding frame");

    let mut out = String::with_capacity(width * height / 4 + 256);

    // DCS introducer + DECGRA raster attributes. P2 selects whether undrawn
    // pixels start opaque (0) or stay transparent (1).
    out.push('\x1b');
    out.push_str("P7;");
    out.push(if mode == TransparencyMode::None {
        '0'
    } else {
        '1'
    });
    out.push_str(";q\"1;1;");
    write_number(&mut out, width);
    out.push(';');
    write_number(&mut out, height);

    if palette.is_empty() {
        out.push_str("\x1b\\");
        return Ok(out);
    }

    // DECGCI color definitions. Transparent slots are emitted as 0;0;0 so
    // that introducer numbers stay aligned with palette positions.
    for (i, entry) in palette.entries().iter().enumerate() {
        out.push('#');
        write_number(&mut out, i);
        out.push_str(";2;");
        if entry.transparent {
            out.push_str("0;0;0");
        } else {
            write_number(&mut out, entry.color.r() as usize);
            out.push(';');
            write_number(&mut out, entry.color.g() as usize);
            out.push(';');
            write_number(&mut out, entry.color.b() as usize);
        }
    }

    // Per-(color, column) 6-bit accumulators for the current band.
    let mut accum = vec![0u8; width * palette.len()];
    let mut active = vec![false; palette.len()];

    let bands = height.div_ceil(SIXEL_CELL_HEIGHT);
    for z in 0..bands {
        if z > 0 {
            // DECGNL: next band
            out.push('-');
        }
        accum.fill(0);
        active.fill(false);

        let y0 = z * SIXEL_CELL_HEIGHT;
        for p in 0..SIXEL_CELL_HEIGHT {
            let y = y0 + p;
            if y >= height {
                break;
            }
            for x in 0..width {
                let rgba = bitmap.pixel(x, y);
                let idx = palette
                    .index_of(&rgba)
                    .ok_or(SixelError::ColorNotInPalette { x, y })?;
                if palette.entry(idx).transparent {
                    // Transparent pixels contribute no bit to any plane.
                    continue;
                }
                active[idx] = true;
                accum[width * idx + x] |= 1 << p;
            }
        }

        let mut first = true;
        for (n, &is_active) in active.iter().enumerate() {
            if !is_active {
                continue;
            }
            if !first {
                // DECGCR: back to column 0 for the next color plane
                out.push('$');
            }
            first = false;

            out.push('#');
            write_number(&mut out, n);

            let row = &accum[width * n..width * (n + 1)];
            let mut run_value = row[0];
            let mut run_len = 1usize;
            for &value in &row[1..] {
                if value == run_value {
                    run_len += 1;
                } else {
                    flush_run(&mut out, run_value, run_len);
                    run_value = value;
                    run_len = 1;
                }
            }
            // A trailing run of empty columns carries no pixels; drop it.
            if run_value != 0 {
                flush_run(&mut out, run_value, run_len);
            }
        }
    }

    out.push_str("\x1b\\");
    Ok(out)
}

/// Emits one run of identical sixel characters, wrapping the repeat
/// introducer at 255.
fn flush_run(out: &mut String, value: u8, mut count: usize) {
    let ch = (63 + value) as char;
    while count > MAX_RUN {
        out.push_str("!255");
        out.push(ch);
        count -= MAX_RUN;
    }
    match count {
        0 => {}
        1..=3 => {
            for _ in 0..count {
                out.push(ch);
            }
        }
        _ => {
            out.push('!');
            write_number(out, count);
            out.push(ch);
        }
    }
}

/// Fast number to string without allocation
#[inline]
fn write_number(out: &mut String, mut n: usize) {
    if n == 0 {
        out.push('0');
        return;
    }

    let mut buf = [0u8; 20];
    let mut i = buf.len();

    while n > 0 {
        i -= 1;
        buf[i] = b'0' + (n % 10) as u8;
        n /= 10;
    }

    out.push_str(unsafe { std::str::from_utf8_unchecked(&buf[i..]) });
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const GREEN: [u8; 4] = [0, 255, 0, 255];

    fn bitmap(pixels: &[[u8; 4]], width: usize, height: usize) -> Bitmap {
        let raw: Vec<u8> = pixels.iter().flatten().copied().collect();
        Bitmap::new(raw, width, height).unwrap()
    }

    #[test]
    fn two_by_two_scenario() {
        let bm = bitmap(&[RED, GREEN, RED, GREEN], 2, 2);
        let palette = Palette::from_bitmap(&bm, TransparencyMode::None, None, None);
        let sixel = encode_frame(&bm, &palette, TransparencyMode::None).unwrap();
        assert_eq!(
            sixel,
            "\x1bP7;0;q\"1;1;2;2#0;2;100;0;0#1;2;0;100;0#0B$#1?B\x1b\\"
        );
    }

    #[test]
    fn encode_is_deterministic() {
        let bm = bitmap(&[RED, GREEN, GREEN, RED], 2, 2);
        let palette = Palette::from_bitmap(&bm, TransparencyMode::Default, None, None);
        let a = encode_frame(&bm, &palette, TransparencyMode::Default).unwrap();
        let b = encode_frame(&bm, &palette, TransparencyMode::Default).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn transparent_pixels_emit_no_bits() {
        let clear = [0u8, 0, 0, 0];
        let bm = bitmap(&[RED, clear], 2, 1);
        let palette = Palette::from_bitmap(&bm, TransparencyMode::Default, None, None);
        let sixel = encode_frame(&bm, &palette, TransparencyMode::Default).unwrap();
        assert!(sixel.starts_with("\x1bP7;1;q\"1;1;2;1"));
        // The transparent slot keeps its introducer number but paints nothing.
        assert!(sixel.contains("#1;2;0;0;0"));
        assert!(!sixel.contains("$"), "only one active color in the band");
    }

    #[test]
    fn empty_palette_yields_header_and_terminator() {
        let bm = bitmap(&[RED], 1, 1);
        let palette = Palette::default();
        let sixel = encode_frame(&bm, &palette, TransparencyMode::None).unwrap();
        assert_eq!(sixel, "\x1bP7;0;q\"1;1;1;1\x1b\\");
    }

    #[test]
    fn rejects_zero_dimensions() {
        let bm = Bitmap::new(Vec::new(), 0, 0).unwrap();
        let palette = Palette::default();
        assert!(encode_frame(&bm, &palette, TransparencyMode::None).is_err());
    }

    #[test]
    fn foreign_pixel_is_an_error() {
        let bm = bitmap(&[RED, GREEN], 2, 1);
        let only_red = Palette::from_bitmap(&bitmap(&[RED], 1, 1), TransparencyMode::None, None, None);
        let err = encode_frame(&bm, &only_red, TransparencyMode::None).unwrap_err();
        assert!(matches!(err, SixelError::ColorNotInPalette { x: 1, y: 0 }));
    }

    #[test]
    fn quantizing_entry_point_wraps_stream() {
        let rgba = vec![255u8, 0, 0, 255];
        let sixel = sixel_encode(&rgba, 1, 1, &EncodeOptions::default()).unwrap();
        assert!(sixel.starts_with("\x1bP7;"));
        assert!(sixel.ends_with("\x1b\\"));
    }

    #[test]
    fn invalid_dimensions() {
        let rgba = vec![0u8; 16];
        assert!(sixel_encode(&rgba, 0, 4, &EncodeOptions::default()).is_err());
        assert!(sixel_encode(&rgba, 4, 0, &EncodeOptions::default()).is_err());
        assert!(sixel_encode(&rgba, 10, 10, &EncodeOptions::default()).is_err());
    }
}
