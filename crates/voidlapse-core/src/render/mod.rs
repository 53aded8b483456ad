pub mod bitmap;

use std::fmt;
use std::path::{Path, PathBuf};

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;
use tracing::{debug, info, warn};

use crate::fallback::Fallback;

/// Scalable fonts tried in order when no font is configured.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "/Library/Fonts/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
    "C:\\Windows\\Fonts\\consola.ttf",
];

/// Text height as a fraction of frame height for the scalable font.
const SCALABLE_SIZE_DIVISOR: f32 = 30.0;
/// Text height as a fraction of frame height for the bitmap fallback.
const BITMAP_SIZE_DIVISOR: u32 = 40;

/// Outline offsets: the 8 neighbours at a distance of 2 pixels.
pub const OUTLINE_OFFSETS: [(i32, i32); 8] = [
    (-2, -2),
    (-2, 0),
    (-2, 2),
    (0, -2),
    (0, 2),
    (2, -2),
    (2, 0),
    (2, 2),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextColor {
    #[default]
    White,
    Black,
}

impl TextColor {
    /// Map a color name to a text color. Anything unrecognized is white.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "white" => Self::White,
            "black" => Self::Black,
            other => {
                warn!(color = other, "unknown text color, using white");
                Self::White
            }
        }
    }

    /// Color of the outline drawn behind the text.
    pub fn outline(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }

    pub fn rgb(self) -> Rgb<u8> {
        match self {
            Self::White => Rgb([255, 255, 255]),
            Self::Black => Rgb([0, 0, 0]),
        }
    }
}

impl fmt::Display for TextColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::White => write!(f, "white"),
            Self::Black => write!(f, "black"),
        }
    }
}

/// The font the overlay is drawn with.
pub enum OverlayFont {
    Scalable { font: FontVec, path: PathBuf },
    Bitmap,
}

impl fmt::Debug for OverlayFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalable { path, .. } => f.debug_struct("Scalable").field("path", path).finish(),
            Self::Bitmap => write!(f, "Bitmap"),
        }
    }
}

impl OverlayFont {
    /// Load the configured font, then the platform candidates, then the built-in bitmap font.
    /// Never fails.
    pub fn load(preferred: Option<&Path>) -> Self {
        let mut chain = Fallback::new("overlay font");
        if let Some(path) = preferred {
            chain = chain.then("configured font", move || load_scalable(path));
        }
        for candidate in FONT_CANDIDATES {
            chain = chain.then("system font", move || load_scalable(Path::new(candidate)));
        }
        let font = chain
            .then("built-in bitmap font", || Ok(OverlayFont::Bitmap))
            .resolve()
            .map(|r| r.value)
            .unwrap_or(OverlayFont::Bitmap);

        match &font {
            OverlayFont::Scalable { path, .. } => info!(?path, "loaded overlay font"),
            OverlayFont::Bitmap => warn!("no scalable font available, using built-in bitmap font"),
        }
        font
    }
}

fn load_scalable(path: &Path) -> Result<OverlayFont> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font {}", path.display()))?;
    let font = FontVec::try_from_vec(data)
        .with_context(|| format!("failed to parse font {}", path.display()))?;
    Ok(OverlayFont::Scalable {
        font,
        path: path.to_path_buf(),
    })
}

/// Draws a timestamp into the lower-left corner of frames.
#[derive(Debug)]
pub struct FrameRenderer {
    font: OverlayFont,
    color: TextColor,
}

impl FrameRenderer {
    pub fn new(font: OverlayFont, color: TextColor) -> Self {
        Self { font, color }
    }

    /// Return a copy of `frame` with `text` drawn on it, outlined in the inverse color.
    pub fn render(&self, frame: &RgbImage, text: &str) -> RgbImage {
        let mut img = frame.clone();
        let height = img.height();

        match &self.font {
            OverlayFont::Scalable { font, .. } => {
                let size = (height as f32 / SCALABLE_SIZE_DIVISOR).max(1.0);
                let scale = PxScale::from(size);
                let ascent = font.as_scaled(scale).ascent();
                let x = size.round() as i32;
                // draw_text_mut positions the top of the ascent line, not the baseline.
                let y = (height as f32 - size - ascent).round() as i32;

                let outline = self.color.outline().rgb();
                for (dx, dy) in OUTLINE_OFFSETS {
                    draw_text_mut(&mut img, outline, x + dx, y + dy, scale, font, text);
                }
                draw_text_mut(&mut img, self.color.rgb(), x, y, scale, font, text);
            }
            OverlayFont::Bitmap => {
                let size = (height / BITMAP_SIZE_DIVISOR).max(1);
                let pixel = ((size as f32 / bitmap::GLYPH_HEIGHT as f32).round() as u32).max(1);
                let x = size as i32;
                let y = height as i32 - size as i32 - (bitmap::GLYPH_HEIGHT * pixel) as i32;

                let outline = self.color.outline().rgb();
                for (dx, dy) in OUTLINE_OFFSETS {
                    bitmap::draw_text(&mut img, outline, x + dx, y + dy, pixel, text);
                }
                bitmap::draw_text(&mut img, self.color.rgb(), x, y, pixel, text);
            }
        }
        img
    }

    /// Load `source`, draw `text`, and write the result to `dest`.
    pub fn render_file(&self, source: &Path, dest: &Path, text: &str) -> Result<()> {
        let frame = image::open(source)
            .with_context(|| format!("failed to load frame {}", source.display()))?
            .into_rgb8();

        let out = self.render(&frame, text);
        out.save(dest)
            .with_context(|| format!("failed to save frame to {}", dest.display()))?;

        debug!(?source, ?dest, text, "rendered frame");
        Ok(())
    }
}
