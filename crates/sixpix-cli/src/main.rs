//! sixpix - Encode, decode and play SIXEL graphics
//!
//! A command-line tool for converting images to/from SIXEL format and
//! playing animated GIFs as SIXEL in the terminal.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage};
use sixpix::animation::Frame;
use sixpix::{
    play, sixel_decode, sixel_encode, Animation, Bitmap, EncodeOptions, FrameMetadata,
    PlayOptions, Result as SixelResult, SixelError, TerminalCapabilities, TransparencyMode,
};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "sixpix")]
#[command(version)]
#[command(about = "Encode, decode and play SIXEL graphics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum TransparencyArg {
    /// Alpha-keyed transparency plus container hints
    #[default]
    Default,
    /// Additionally key out the color at the top-left pixel
    TopLeft,
    /// Additionally key out the container's background color
    Background,
    /// No transparency
    None,
}

impl From<TransparencyArg> for TransparencyMode {
    fn from(arg: TransparencyArg) -> Self {
        match arg {
            TransparencyArg::Default => TransparencyMode::Default,
            TransparencyArg::TopLeft => TransparencyMode::TopLeft,
            TransparencyArg::Background => TransparencyMode::Background,
            TransparencyArg::None => TransparencyMode::None,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Encode an image to SIXEL format
    Encode {
        /// Input image file (PNG, JPEG, GIF, WebP)
        input: PathBuf,

        /// Output SIXEL file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum number of colors (2-256)
        #[arg(short, long, default_value = "256")]
        colors: u16,

        /// Transparency handling
        #[arg(short, long, value_enum, default_value_t = TransparencyArg::Default)]
        transparency: TransparencyArg,

        /// Resize to this width (height follows the aspect ratio if omitted)
        #[arg(long)]
        width: Option<u32>,

        /// Resize to this height (width follows the aspect ratio if omitted)
        #[arg(long)]
        height: Option<u32>,
    },

    /// Decode a SIXEL file to PNG
    Decode {
        /// Input SIXEL file (use - for stdin)
        input: PathBuf,

        /// Output PNG file (default: input with .png extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Display an image as SIXEL in the terminal
    Show {
        /// Input image file (PNG, JPEG, GIF, WebP)
        input: PathBuf,

        /// Maximum number of colors (2-256)
        #[arg(short, long, default_value = "256")]
        colors: u16,

        /// Transparency handling
        #[arg(short, long, value_enum, default_value_t = TransparencyArg::Default)]
        transparency: TransparencyArg,

        /// Resize to this width (height follows the aspect ratio if omitted)
        #[arg(long)]
        width: Option<u32>,

        /// Resize to this height (width follows the aspect ratio if omitted)
        #[arg(long)]
        height: Option<u32>,
    },

    /// Play an animated GIF as SIXEL in the terminal
    Play {
        /// Input GIF file
        input: PathBuf,

        /// Repeat count override (-1 = image default, 0 = loop forever)
        #[arg(short, long, default_value = "-1")]
        repeat: i32,

        /// Per-frame delay override in milliseconds (0 = per-frame metadata)
        #[arg(short, long, default_value = "0")]
        delay: i32,

        /// First frame to play (negative counts from the end)
        #[arg(long, default_value = "0")]
        start: i64,

        /// Last frame to play (negative counts from the end)
        #[arg(long, default_value = "-1")]
        end: i64,

        /// Transparency handling
        #[arg(short, long, value_enum, default_value_t = TransparencyArg::Default)]
        transparency: TransparencyArg,
    },
}

/// Delay table extracted from the GIF container, exposed through the codec's
/// metadata capability.
struct GifMetadata {
    delays_ms: Vec<i32>,
}

impl FrameMetadata for GifMetadata {
    fn frame_delay_ms(&self, index: usize) -> SixelResult<i32> {
        self.delays_ms
            .get(index)
            .copied()
            .ok_or_else(|| SixelError::Unsupported(format!("no delay for frame {index}")))
    }
}

/// Resizes so that a given dimension is hit exactly and a missing one
/// follows the source aspect ratio. No-op when neither is given.
fn resize_to_fit(img: DynamicImage, width: Option<u32>, height: Option<u32>) -> DynamicImage {
    let (src_w, src_h) = (img.width(), img.height());
    let (w, h) = match (width, height) {
        (None, None) => return img,
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, (w as u64 * src_h as u64 / src_w as u64).max(1) as u32),
        (None, Some(h)) => ((h as u64 * src_w as u64 / src_h as u64).max(1) as u32, h),
    };
    if (w, h) == (src_w, src_h) {
        img
    } else {
        img.resize_exact(w, h, image::imageops::FilterType::Lanczos3)
    }
}

fn load_rgba(
    input: &PathBuf,
    width: Option<u32>,
    height: Option<u32>,
) -> Result<(Vec<u8>, u32, u32), Box<dyn std::error::Error>> {
    let img = image::open(input)
        .map_err(|e| format!("Failed to open '{}': {}", input.display(), e))?;
    let rgba_img = resize_to_fit(img, width, height).to_rgba8();
    let (w, h) = rgba_img.dimensions();
    Ok((rgba_img.into_raw(), w, h))
}

fn load_gif(input: &PathBuf) -> Result<(Vec<Frame>, GifMetadata), Box<dyn std::error::Error>> {
    let file = fs::File::open(input)
        .map_err(|e| format!("Failed to open '{}': {}", input.display(), e))?;
    let decoder = GifDecoder::new(io::BufReader::new(file))?;
    let mut frames = Vec::new();
    let mut delays_ms = Vec::new();
    for frame in decoder.into_frames() {
        let frame = frame?;
        let (numer, denom) = frame.delay().numer_denom_ms();
        delays_ms.push((numer / denom.max(1)) as i32);
        let buffer = frame.into_buffer();
        let (w, h) = buffer.dimensions();
        frames.push(Frame::new(Bitmap::new(
            buffer.into_raw(),
            w as usize,
            h as usize,
        )?));
    }
    Ok((frames, GifMetadata { delays_ms }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Encode {
            input,
            output,
            colors,
            transparency,
            width,
            height,
        } => {
            let (pixels, w, h) = load_rgba(&input, width, height)?;

            eprintln!(
                "Encoding '{}' ({}x{}) with {} colors",
                input.display(),
                w,
                h,
                colors.clamp(2, 256),
            );

            let opts = EncodeOptions {
                max_colors: colors.clamp(2, 256),
                transparency: transparency.into(),
                ..EncodeOptions::default()
            };
            let sixel = sixel_encode(&pixels, w as usize, h as usize, &opts)?;

            match output {
                Some(path) => {
                    fs::write(&path, &sixel)?;
                    eprintln!("Written {} bytes to '{}'", sixel.len(), path.display());
                }
                None => {
                    io::stdout().write_all(sixel.as_bytes())?;
                }
            }
        }

        Commands::Decode { input, output } => {
            let sixel_data = if input.to_string_lossy() == "-" {
                let mut buf = Vec::new();
                io::stdin().read_to_end(&mut buf)?;
                buf
            } else {
                fs::read(&input)
                    .map_err(|e| format!("Failed to read '{}': {}", input.display(), e))?
            };

            eprintln!("Decoding ({} bytes)", sixel_data.len());

            let decoded = sixel_decode(&sixel_data)?;

            let output_path = output.unwrap_or_else(|| {
                let mut p = input.clone();
                p.set_extension("png");
                p
            });

            let img = image::RgbaImage::from_raw(
                decoded.width as u32,
                decoded.height as u32,
                decoded.pixels,
            )
            .ok_or("Failed to create image from decoded data")?;
            img.save(&output_path)?;

            eprintln!(
                "Decoded: {}x{} pixels -> '{}'",
                decoded.width,
                decoded.height,
                output_path.display()
            );
        }

        Commands::Show {
            input,
            colors,
            transparency,
            width,
            height,
        } => {
            let (pixels, w, h) = load_rgba(&input, width, height)?;

            let opts = EncodeOptions {
                max_colors: colors.clamp(2, 256),
                transparency: transparency.into(),
                ..EncodeOptions::default()
            };
            let sixel = sixel_encode(&pixels, w as usize, h as usize, &opts)?;
            print!("{}", sixel);
        }

        Commands::Play {
            input,
            repeat,
            delay,
            start,
            end,
            transparency,
        } => {
            let (frames, metadata) = load_gif(&input)?;
            let mut animation = Animation::from_metadata(frames, &metadata)?;
            animation.transparency = transparency.into();
            let animation = Arc::new(animation);

            let options = PlayOptions {
                overwrite_repeat: repeat,
                overwrite_delay_ms: delay,
                start_frame: start,
                end_frame: end,
            };

            let cancel = CancellationToken::new();
            {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    let _ = tokio::signal::ctrl_c().await;
                    cancel.cancel();
                });
            }

            let mut stdout = io::stdout().lock();
            play(
                animation,
                options,
                &TerminalCapabilities::default(),
                cancel,
                &mut stdout,
            )
            .await?;
            writeln!(stdout)?;
        }
    }

    Ok(())
}
