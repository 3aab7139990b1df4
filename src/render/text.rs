use fontdue::{Font, FontSettings};
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::canvas::{blend_pixel, Color};
use crate::error::RenderError;

const FONT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Width measurement used by text layout. Implemented by [`TextRenderer`]
/// from real glyph metrics.
pub trait MeasureText {
    fn text_width(&self, text: &str) -> f32;
    fn line_height(&self) -> f32;
}

/// A font at one pixel size.
#[derive(Clone)]
pub struct TextRenderer {
    font: Arc<Font>,
    size: f32,
}

impl TextRenderer {
    pub fn new(font: Arc<Font>, size: f32) -> Self {
        Self { font, size }
    }

    pub fn with_size(&self, size: f32) -> Self {
        Self {
            font: Arc::clone(&self.font),
            size: size.max(1.0),
        }
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    fn ascent(&self) -> f32 {
        self.font
            .horizontal_line_metrics(self.size)
            .map_or(self.size * 0.8, |m| m.ascent)
    }

    /// Draw `text` with its top-left corner at `(x, y)`.
    pub fn draw(&self, img: &mut RgbImage, text: &str, x: f32, y: f32, color: Color, opacity: f32) {
        let baseline = y + self.ascent();
        let mut cursor_x = x;
        for ch in text.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, self.size);
            let glyph_x = cursor_x.round() as i32 + metrics.xmin;
            let glyph_y = baseline.round() as i32 - metrics.height as i32 - metrics.ymin;

            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let coverage = bitmap[gy * metrics.width + gx];
                    if coverage == 0 {
                        continue;
                    }
                    let a = coverage as f32 / 255.0 * opacity;
                    blend_pixel(img, glyph_x + gx as i32, glyph_y + gy as i32, color, a);
                }
            }

            cursor_x += metrics.advance_width;
        }
    }
}

impl MeasureText for TextRenderer {
    fn text_width(&self, text: &str) -> f32 {
        text.chars()
            .map(|ch| self.font.metrics(ch, self.size).advance_width)
            .sum()
    }

    fn line_height(&self) -> f32 {
        self.font
            .horizontal_line_metrics(self.size)
            .map_or(self.size * 1.2, |m| m.ascent - m.descent)
    }
}

/// Common system font locations, tried in order when no font is configured.
pub const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

fn parse_font(bytes: Vec<u8>, origin: &str) -> Result<Font, RenderError> {
    Font::from_bytes(bytes, FontSettings::default()).map_err(|e| RenderError::asset(origin, e))
}

pub fn load_font_file(path: &Path) -> Result<Font, RenderError> {
    let bytes = std::fs::read(path).map_err(|e| RenderError::asset(path, e))?;
    parse_font(bytes, &path.display().to_string())
}

fn font_cache_dir() -> Option<PathBuf> {
    let dir = dirs::cache_dir().or_else(dirs::home_dir)?.join("wavereel").join("fonts");
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

/// Fetch a font over HTTP(S), caching it by file name.
pub fn download_font(url: &str) -> Result<Font, RenderError> {
    let file_name = url
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("font.ttf");
    let cached = font_cache_dir().map(|dir| dir.join(file_name));

    if let Some(path) = cached.as_deref().filter(|p| p.exists()) {
        log::info!("Using cached font: {}", path.display());
        return load_font_file(path);
    }

    log::info!("Downloading font from {}", url);
    let client = reqwest::blocking::Client::builder()
        .timeout(FONT_DOWNLOAD_TIMEOUT)
        .build()
        .map_err(|e| RenderError::asset(url, e))?;
    let bytes = client
        .get(url)
        .send()
        .and_then(|resp| resp.error_for_status())
        .and_then(|resp| resp.bytes())
        .map_err(|e| RenderError::asset(url, e))?
        .to_vec();

    if let Some(path) = &cached {
        if let Err(e) = std::fs::write(path, &bytes) {
            log::warn!("Could not cache font at {}: {}", path.display(), e);
        }
    }
    parse_font(bytes, url)
}

/// Resolve the font used for every text overlay.
///
/// An explicit `font` may be a file path or an http(s) URL; when it fails to
/// load, the system list is tried. Returns `None` when nothing loads, in which
/// case text overlays are skipped.
pub fn resolve_font(font: Option<&str>, system_fonts: &[PathBuf]) -> Option<Arc<Font>> {
    if let Some(spec) = font {
        let loaded = if spec.starts_with("http://") || spec.starts_with("https://") {
            download_font(spec)
        } else {
            load_font_file(Path::new(spec))
        };
        match loaded {
            Ok(font) => {
                log::info!("Loaded font: {}", spec);
                return Some(Arc::new(font));
            }
            Err(e) => log::warn!("{}; falling back to system fonts", e),
        }
    }

    for path in system_fonts.iter().filter(|p| p.exists()) {
        match load_font_file(path) {
            Ok(font) => {
                log::info!("Using system font: {}", path.display());
                return Some(Arc::new(font));
            }
            Err(e) => log::debug!("{}", e),
        }
    }

    log::warn!("No usable font found; titles and subtitles will not be drawn");
    None
}
