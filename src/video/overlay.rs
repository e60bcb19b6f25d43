//! Composites a cropped frame with the logo and its timestamp label.

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{imageops, DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use thiserror::Error;

use crate::assets;
use crate::map::Region;

const LOGO_POSITION: (i64, i64) = (0, 0);
const LABEL_CENTER_Y: f32 = 50.0;
const LABEL_LINE_SPACING: f32 = 1.5;
const LABEL_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Searched in order when no font is configured.
const FONT_CANDIDATES: &[&str] = &[
    "C:\\Windows\\Fonts\\arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "/usr/share/fonts/truetype/msttcorefonts/Arial.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LabelError {
    #[error("font unavailable: {reason}")]
    FontUnavailable { reason: String },
}

/// Where and how large the label block is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelLayout {
    pub center_x: f32,
    pub center_y: f32,
    pub max_width: f32,
    pub font_size: f32,
    pub line_spacing: f32,
}

pub trait LabelPainter: Send + Sync {
    fn paint(&self, canvas: &mut RgbaImage, label: &str, layout: &LabelLayout) -> Result<(), LabelError>;
}

/// Renders labels with a TrueType/OpenType font.
pub struct GlyphPainter {
    font: FontVec,
}

impl GlyphPainter {
    pub fn from_file(path: &Path) -> Result<Self, LabelError> {
        let data = std::fs::read(path).map_err(|err| LabelError::FontUnavailable {
            reason: format!("{}: {err}", path.display()),
        })?;
        let font = FontVec::try_from_vec(data).map_err(|err| LabelError::FontUnavailable {
            reason: format!("{}: {err}", path.display()),
        })?;
        Ok(Self { font })
    }

    /// Loads `configured` when given, otherwise the first well-known system font found.
    pub fn discover(configured: Option<&Path>) -> Result<Self, LabelError> {
        if let Some(path) = configured {
            return Self::from_file(path);
        }
        let path = FONT_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.is_file())
            .ok_or_else(|| LabelError::FontUnavailable {
                reason: "no system font found, set font_path in settings.json".to_string(),
            })?;
        Self::from_file(&path)
    }
}

impl LabelPainter for GlyphPainter {
    fn paint(&self, canvas: &mut RgbaImage, label: &str, layout: &LabelLayout) -> Result<(), LabelError> {
        let scale = PxScale::from(layout.font_size);
        let measure = |text: &str| text_size(scale, &self.font, text).0 as f32;
        let lines = wrap_words(label, layout.max_width, measure);
        for (line, (x, y)) in lines.iter().zip(line_origins(&lines, layout, measure)) {
            draw_text_mut(canvas, LABEL_COLOR, x as i32, y as i32, scale, &self.font, line);
        }
        Ok(())
    }
}

/// Stand-in used when no font could be loaded: every label fails, so every frame is
/// skipped with the original load error.
pub struct MissingFont {
    pub reason: String,
}

impl LabelPainter for MissingFont {
    fn paint(&self, _canvas: &mut RgbaImage, _label: &str, _layout: &LabelLayout) -> Result<(), LabelError> {
        Err(LabelError::FontUnavailable {
            reason: self.reason.clone(),
        })
    }
}

/// Greedy word wrap. A single word wider than `max_width` gets a line of its own.
pub fn wrap_words(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{current} {word}");
        if measure(&candidate) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Top-left origin of every line, with the block centered on `(center_x, center_y)`
/// and each line centered horizontally.
fn line_origins(lines: &[String], layout: &LabelLayout, measure: impl Fn(&str) -> f32) -> Vec<(f32, f32)> {
    let count = lines.len() as f32;
    let line_height = layout.font_size * layout.line_spacing;
    let block_height = count * line_height - (layout.line_spacing - 1.0) * layout.font_size;
    let top = layout.center_y - block_height / 2.0;
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let x = layout.center_x - measure(line) / 2.0;
            (x, top + i as f32 * line_height)
        })
        .collect()
}

pub struct Compositor {
    width: u32,
    height: u32,
    logo: RgbaImage,
    painter: Box<dyn LabelPainter>,
    font_size: f32,
}

impl Compositor {
    /// Canvas sized to `region`, using the embedded logo.
    pub fn new(region: Region, painter: Box<dyn LabelPainter>, font_size: f32) -> Result<Self, image::ImageError> {
        let logo = image::load_from_memory(assets::LOGO)?.to_rgba8();
        Ok(Self {
            width: region.width(),
            height: region.height(),
            logo,
            painter,
            font_size,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn layout(&self) -> LabelLayout {
        LabelLayout {
            center_x: self.width as f32 / 2.0,
            center_y: LABEL_CENTER_Y,
            max_width: self.width as f32,
            font_size: self.font_size,
            line_spacing: LABEL_LINE_SPACING,
        }
    }

    pub fn compose(&self, frame: &DynamicImage, label: &str) -> Result<RgbaImage, LabelError> {
        let mut canvas = RgbaImage::from_pixel(self.width, self.height, BACKGROUND);
        imageops::overlay(&mut canvas, &frame.to_rgba8(), 0, 0);
        imageops::overlay(&mut canvas, &self.logo, LOGO_POSITION.0, LOGO_POSITION.1);
        self.painter.paint(&mut canvas, label, &self.layout())?;
        Ok(canvas)
    }
}
