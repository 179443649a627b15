//! Terminal-capability interface.
//!
//! The codec never talks to a terminal itself; whoever hosts it (the CLI, a
//! TUI, a test) answers the device-attribute and window-report queries and
//! hands the results in through [`TerminalCapabilities`]. The probe trait
//! carries an explicit refresh lifecycle instead of process-wide caching, so
//! a host can re-query after a window resize.

use crate::Result;

/// A width/height pair, in pixels or character cells depending on context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Cell size assumed when the terminal does not answer the query.
pub const DEFAULT_CELL_SIZE: Extent = Extent::new(10, 20);

/// A snapshot of what the hosting terminal reported.
///
/// Everything except the support flag is optional: plenty of terminals
/// answer the device-attributes query but not the window reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TerminalCapabilities {
    /// Device attributes advertised Sixel (parameter 4).
    pub sixel_supported: bool,
    /// Pixel size of one character cell.
    pub cell_size: Option<Extent>,
    /// Window size in pixels.
    pub window_pixel_size: Option<Extent>,
    /// Window size in character cells.
    pub window_char_size: Option<Extent>,
    /// Terminal background color, for blending partially transparent pixels.
    pub background: Option<[u8; 3]>,
}

impl TerminalCapabilities {
    /// The reported cell size, or [`DEFAULT_CELL_SIZE`] when unknown.
    pub fn cell_size_or_default(&self) -> Extent {
        self.cell_size.unwrap_or(DEFAULT_CELL_SIZE)
    }
}

/// Source of [`TerminalCapabilities`], injected by the host.
///
/// `refresh` re-issues whatever queries the implementation is backed by;
/// `capabilities` returns the latest snapshot without touching the terminal.
pub trait CapabilityProbe {
    fn refresh(&mut self) -> Result<()>;
    fn capabilities(&self) -> TerminalCapabilities;
}

/// A probe with fixed answers, for tests and configuration injection.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticCapabilities(pub TerminalCapabilities);

impl CapabilityProbe for StaticCapabilities {
    fn refresh(&mut self) -> Result<()> {
        Ok(())
    }

    fn capabilities(&self) -> TerminalCapabilities {
        self.0
    }
}
