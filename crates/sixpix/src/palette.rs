//! Palette construction: deduplicate the colors of a quantized bitmap into
//! an ordered, unique palette, classifying the transparent slots.

use std::collections::HashMap;

use crate::color::SixelColor;
use crate::Bitmap;

/// Governs which source pixels map to the transparent palette slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransparencyMode {
    /// Alpha-keyed transparency plus the format's transparent-color hint.
    #[default]
    Default,
    /// Additionally treat the color found at (0, 0) as transparent.
    TopLeft,
    /// Additionally treat the background-color hint as transparent.
    Background,
    /// No transparency; the encoder starts the screen opaque.
    None,
}

/// One palette slot: the source 8-bit color, its wire-scale value and the
/// transparency classification that was applied when the palette was built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaletteEntry {
    pub rgba: [u8; 4],
    pub color: SixelColor,
    pub transparent: bool,
}

/// An ordered sequence of unique colors.
///
/// Insertion order is first occurrence in row-major pixel order; the encoder
/// relies on it because the position of an entry is its color-introducer
/// number. Lookup by exact 8-bit value is O(1).
#[derive(Clone, Debug, Default)]
pub struct Palette {
    entries: Vec<PaletteEntry>,
    index: HashMap<[u8; 4], usize>,
}

impl Palette {
    /// Builds a palette from a quantized bitmap in a single row-major scan.
    ///
    /// `transparent_color` and `background_color` are RGB hints from the
    /// source container (PNG transparent palette color, GIF/WebP background);
    /// hint comparison ignores alpha, the way container metadata stores them.
    /// This never fails: an empty bitmap yields an empty palette.
    pub fn from_bitmap(
        bitmap: &Bitmap,
        mode: TransparencyMode,
        transparent_color: Option<[u8; 3]>,
        background_color: Option<[u8; 3]>,
    ) -> Self {
        let mut palette = Self::default();
        for y in 0..bitmap.height() {
            for x in 0..bitmap.width() {
                let rgba = bitmap.pixel(x, y);
                if palette.index.contains_key(&rgba) {
                    continue;
                }
                let slot = palette.entries.len();
                let transparent = match mode {
                    TransparencyMode::None => false,
                    _ => {
                        rgba[3] == 0
                            || matches_hint(rgba, transparent_color)
                            || (mode == TransparencyMode::TopLeft && slot == 0)
                            || (mode == TransparencyMode::Background
                                && matches_hint(rgba, background_color))
                    }
                };
                palette.entries.push(PaletteEntry {
                    rgba,
                    color: SixelColor::from_rgba8(rgba[0], rgba[1], rgba[2], rgba[3]),
                    transparent,
                });
                palette.index.insert(rgba, slot);
            }
        }
        palette
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn entry(&self, index: usize) -> &PaletteEntry {
        &self.entries[index]
    }

    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    /// Returns the slot of an exact 8-bit color, if present.
    #[inline]
    pub fn index_of(&self, rgba: &[u8; 4]) -> Option<usize> {
        self.index.get(rgba).copied()
    }
}

#[inline]
fn matches_hint(rgba: [u8; 4], hint: Option<[u8; 3]>) -> bool {
    match hint {
        Some([r, g, b]) => rgba[0] == r && rgba[1] == g && rgba[2] == b,
        None => false,
    }
}
