//! Frame sequencing and paced playback: one blocking producer encodes the
//! frames of a window into a write-once cache while the consumer emits them
//! on the frame-delay schedule, with cooperative cancellation.

use std::io::Write;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::encoder::encode_frame;
use crate::palette::{Palette, TransparencyMode};
use crate::terminal::TerminalCapabilities;
use crate::{Bitmap, Result, SixelError};

/// Fallback delay when neither an override nor frame metadata supplies one.
pub const DEFAULT_FRAME_DELAY_MS: u32 = 100;

/// One frame of an animated image.
///
/// Frames are immutable once handed to an [`Animation`]. A negative delay
/// means "use the format default".
#[derive(Clone, Debug)]
pub struct Frame {
    pub bitmap: Bitmap,
    pub delay_ms: i32,
}

impl Frame {
    pub fn new(bitmap: Bitmap) -> Self {
        Self {
            bitmap,
            delay_ms: -1,
        }
    }

    pub fn with_delay(bitmap: Bitmap, delay_ms: i32) -> Self {
        Self { bitmap, delay_ms }
    }
}

/// Per-format frame metadata, implemented by the host imaging layer.
///
/// Containers differ in where delay, repeat and background live; the codec
/// only ever consumes this capability view and never branches on a format
/// name.
pub trait FrameMetadata {
    /// Delay before the next frame in milliseconds.
    ///
    /// Still formats without per-frame timing return
    /// [`SixelError::Unsupported`].
    fn frame_delay_ms(&self, index: usize) -> Result<i32>;

    /// Animation repeat count; 0 means infinite.
    fn repeat_count(&self) -> u32 {
        0
    }

    fn background_color(&self) -> Option<[u8; 3]> {
        None
    }

    fn transparent_color(&self) -> Option<[u8; 3]> {
        None
    }
}

/// An ordered sequence of frames plus the hints that drive encoding and
/// playback. Owned by the pipeline for its lifetime.
#[derive(Clone, Debug)]
pub struct Animation {
    frames: Vec<Frame>,
    /// Playback passes; 0 means repeat forever.
    pub repeat_count: u32,
    /// Delay for frames whose own delay is negative.
    pub default_delay_ms: u32,
    pub transparency: TransparencyMode,
    pub transparent_color: Option<[u8; 3]>,
    pub background_color: Option<[u8; 3]>,
}

impl Animation {
    pub fn new(frames: Vec<Frame>) -> Result<Self> {
        if frames.is_empty() {
            return Err(SixelError::Unsupported(
                "an animation needs at least one frame".into(),
            ));
        }
        Ok(Self {
            frames,
            repeat_count: 0,
            default_delay_ms: DEFAULT_FRAME_DELAY_MS,
            transparency: TransparencyMode::Default,
            transparent_color: None,
            background_color: None,
        })
    }

    /// Builds an animation, resolving missing frame delays and the repeat,
    /// background and transparency hints through the host's metadata
    /// capability.
    pub fn from_metadata(mut frames: Vec<Frame>, metadata: &dyn FrameMetadata) -> Result<Self> {
        for (index, frame) in frames.iter_mut().enumerate() {
            if frame.delay_ms < 0 {
                if let Ok(delay) = metadata.frame_delay_ms(index) {
                    frame.delay_ms = delay;
                }
            }
        }
        let mut animation = Self::new(frames)?;
        animation.repeat_count = metadata.repeat_count();
        animation.background_color = metadata.background_color();
        animation.transparent_color = metadata.transparent_color();
        Ok(animation)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn can_animate(&self) -> bool {
        self.frames.len() > 1
    }

    /// Override beats frame metadata beats the format default.
    fn resolved_delay(&self, index: usize, overwrite_delay_ms: i32) -> Duration {
        let ms = if overwrite_delay_ms > 0 {
            overwrite_delay_ms as u64
        } else {
            let delay = self.frames[index].delay_ms;
            if delay >= 0 {
                delay as u64
            } else {
                self.default_delay_ms as u64
            }
        };
        Duration::from_millis(ms)
    }
}

/// An inclusive, normalized range of frame indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameWindow {
    pub start: usize,
    pub end: usize,
}

impl FrameWindow {
    /// Wraps both bounds modulo `frame_count` (negative indices count back
    /// from the last frame) and swaps them when reversed.
    pub fn normalize(start: i64, end: i64, frame_count: usize) -> Self {
        let count = frame_count as i64;
        let wrap = |index: i64| index.rem_euclid(count) as usize;
        let (a, b) = (wrap(start), wrap(end));
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    /// Number of frames in the window (never zero).
    pub fn span(&self) -> usize {
        self.end - self.start + 1
    }
}

/// Options for [`encode_frames`] and [`play`].
#[derive(Clone, Copy, Debug)]
pub struct PlayOptions {
    /// Repeat override: negative = image default, 0 = infinite, N = N passes.
    pub overwrite_repeat: i32,
    /// Delay override in milliseconds; 0 or less = per-frame metadata.
    pub overwrite_delay_ms: i32,
    /// First frame of the window; wraps, negative counts from the end.
    pub start_frame: i64,
    /// Last frame of the window; wraps, negative counts from the end.
    pub end_frame: i64,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            overwrite_repeat: -1,
            overwrite_delay_ms: 0,
            start_frame: 0,
            end_frame: -1,
        }
    }
}

/// Starts encoding the window's frames in the background and returns the
/// consuming end of the pipeline.
///
/// Must run inside a tokio runtime: the CPU-bound encode loop is spawned on
/// the blocking pool. Each cache slot is written exactly once before its
/// index crosses the handoff channel, so repeat passes can replay the cache
/// without further synchronization.
pub fn encode_frames(
    animation: Arc<Animation>,
    options: PlayOptions,
    cancel: CancellationToken,
) -> FrameStream {
    let count = animation.frame_count();
    let window = FrameWindow::normalize(options.start_frame, options.end_frame, count);
    // A single-frame image yields exactly one frame, whatever the repeat says.
    let passes = if count < 2 {
        1
    } else if options.overwrite_repeat >= 0 {
        options.overwrite_repeat as u32
    } else {
        animation.repeat_count
    };

    let slots = window.span();
    let cache: Arc<Vec<OnceLock<Arc<str>>>> = Arc::new((0..slots).map(|_| OnceLock::new()).collect());
    let (ready_tx, ready_rx) = mpsc::channel(slots);

    let producer = {
        let animation = Arc::clone(&animation);
        let cache = Arc::clone(&cache);
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            for slot in 0..slots {
                if cancel.is_cancelled() {
                    return Err(SixelError::Cancelled);
                }
                let frame = &animation.frames()[window.start + slot];
                let palette = Palette::from_bitmap(
                    &frame.bitmap,
                    animation.transparency,
                    animation.transparent_color,
                    animation.background_color,
                );
                let text = encode_frame(&frame.bitmap, &palette, animation.transparency)?;
                let _ = cache[slot].set(Arc::from(text));
                if ready_tx.blocking_send(slot).is_err() {
                    // Consumer is gone; nothing left to hand off.
                    return Ok(());
                }
            }
            debug!(frames = slots, "encode task finished");
            Ok(())
        })
    };

    FrameStream {
        animation,
        overwrite_delay_ms: options.overwrite_delay_ms,
        window,
        cache,
        ready: ready_rx,
        passes,
        pass: 0,
        pos: 0,
        producer: Some(producer),
        cancel,
        done: false,
    }
}

/// The consuming end of the frame pipeline; see [`encode_frames`].
pub struct FrameStream {
    animation: Arc<Animation>,
    overwrite_delay_ms: i32,
    window: FrameWindow,
    cache: Arc<Vec<OnceLock<Arc<str>>>>,
    ready: mpsc::Receiver<usize>,
    passes: u32,
    pass: u32,
    pos: usize,
    producer: Option<tokio::task::JoinHandle<Result<()>>>,
    cancel: CancellationToken,
    done: bool,
}

impl FrameStream {
    /// Yields the next encoded frame and its resolved delay.
    ///
    /// Blocks on the encode task only during the first pass; repeat passes
    /// replay the cache. Cancellation surfaces once as
    /// [`SixelError::Cancelled`], after which the stream is exhausted.
    pub async fn next(&mut self) -> Option<Result<(Arc<str>, Duration)>> {
        if self.done {
            return None;
        }
        if self.pos >= self.window.span() {
            self.pos = 0;
            self.pass += 1;
            if self.passes != 0 && self.pass >= self.passes {
                self.done = true;
                return None;
            }
        }

        let slot = self.pos;
        if self.pass == 0 {
            let received = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.done = true;
                    return Some(Err(SixelError::Cancelled));
                }
                ready = self.ready.recv() => ready,
            };
            let Some(ready_slot) = received else {
                // The producer stopped before finishing the window.
                self.done = true;
                return match self.join_producer().await {
                    Ok(()) => None,
                    Err(err) => Some(Err(err)),
                };
            };
            debug_assert_eq!(ready_slot, slot);
        } else if self.cancel.is_cancelled() {
            self.done = true;
            return Some(Err(SixelError::Cancelled));
        }

        let Some(text) = self.cache[slot].get().cloned() else {
            self.done = true;
            return Some(Err(SixelError::Pipeline(format!(
                "frame slot {slot} signalled ready but never written"
            ))));
        };
        let frame_index = self.window.start + slot;
        let delay = self
            .animation
            .resolved_delay(frame_index, self.overwrite_delay_ms);
        self.pos += 1;
        Some(Ok((text, delay)))
    }

    async fn join_producer(&mut self) -> Result<()> {
        match self.producer.take() {
            None => Ok(()),
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(join_error) => Err(SixelError::Pipeline(join_error.to_string())),
            },
        }
    }
}

/// Plays an animation to `out`, pacing frames by their resolved delay.
///
/// Reserves enough terminal rows for the image (using the probed cell size),
/// then redraws over the same spot with a cursor save/restore around every
/// frame. Elapsed encode and write time is subtracted from each wait so
/// playback stays on schedule. Cancellation is normal termination and
/// returns `Ok`.
pub async fn play<W: Write>(
    animation: Arc<Animation>,
    options: PlayOptions,
    capabilities: &TerminalCapabilities,
    cancel: CancellationToken,
    out: &mut W,
) -> Result<()> {
    if !animation.can_animate() {
        return Err(SixelError::Unsupported(
            "cannot animate a single-frame image".into(),
        ));
    }

    let image_height = animation.frames()[0].bitmap.height();
    let cell = capabilities.cell_size_or_default();
    let lines = image_height.div_ceil(cell.height.max(1) as usize).max(1);
    // Reserve rows, park the cursor at the top of the reservation, save it.
    write!(out, "{}\x1b[{lines}A\x1b[s", "\n".repeat(lines))?;

    let mut stream = encode_frames(animation, options, cancel.clone());
    loop {
        let started = Instant::now();
        match stream.next().await {
            None => break,
            Some(Err(SixelError::Cancelled)) => break,
            Some(Err(err)) => return Err(err),
            Some(Ok((text, delay))) => {
                // Restore the cursor, clear the reservation, draw the frame.
                write!(out, "\x1b[u\x1b[0J{text}")?;
                out.flush()?;
                let remaining = delay.saturating_sub(started.elapsed());
                if !remaining.is_zero() {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(remaining) => {}
                    }
                }
            }
        }
    }
    Ok(())
}
