use image::imageops::FilterType;
use image::{GrayImage, Luma, RgbImage, RgbaImage};
use std::path::Path;

use super::canvas::overlay_rgba;
use crate::error::RenderError;

/// Edge margin cropped off the source before masking.
const CROP_MARGIN: f32 = 0.05;
const MASK_SUPERSAMPLE: u32 = 4;

/// Default avatar diameter for a frame.
pub fn default_size(width: u32, height: u32) -> u32 {
    width.min(height) / 4
}

/// Circular mask with anti-aliased edges, from `MASK_SUPERSAMPLE`^2 samples
/// per pixel.
pub fn circular_mask(size: u32) -> GrayImage {
    let n = MASK_SUPERSAMPLE;
    let r = size as f32 / 2.0;
    GrayImage::from_fn(size, size, |x, y| {
        let mut inside = 0;
        for sy in 0..n {
            for sx in 0..n {
                let fx = x as f32 + (sx as f32 + 0.5) / n as f32 - r;
                let fy = y as f32 + (sy as f32 + 0.5) / n as f32 - r;
                if fx * fx + fy * fy <= r * r {
                    inside += 1;
                }
            }
        }
        Luma([(inside * 255 / (n * n)) as u8])
    })
}

/// Crop the margin, resize to `size` and cut to a circle.
pub fn prepare_avatar(source: &RgbaImage, size: u32) -> RgbaImage {
    let (w, h) = source.dimensions();
    let margin = (w.min(h) as f32 * CROP_MARGIN) as u32;
    let cropped = image::imageops::crop_imm(
        source,
        margin,
        margin,
        w.saturating_sub(margin * 2).max(1),
        h.saturating_sub(margin * 2).max(1),
    )
    .to_image();
    let mut avatar = image::imageops::resize(&cropped, size, size, FilterType::Lanczos3);

    let mask = circular_mask(size);
    for (px, m) in avatar.pixels_mut().zip(mask.pixels()) {
        px.0[3] = (px.0[3] as u32 * m.0[0] as u32 / 255) as u8;
    }
    avatar
}

pub fn load_avatar(path: &Path, size: u32) -> Result<RgbaImage, RenderError> {
    let img = image::open(path).map_err(|e| RenderError::asset(path, e))?;
    log::info!("Loaded avatar {} at {}px", path.display(), size);
    Ok(prepare_avatar(&img.to_rgba8(), size))
}

/// A masked avatar and where it lands on the frame.
#[derive(Clone, Debug)]
pub struct PlacedAvatar {
    pub image: RgbaImage,
    pub x: i32,
    pub y: i32,
}

impl PlacedAvatar {
    pub fn centered(image: RgbaImage, width: u32, height: u32) -> Self {
        let x = (width as i32 - image.width() as i32) / 2;
        let y = (height as i32 - image.height() as i32) / 2;
        Self { image, x, y }
    }

    pub fn size(&self) -> u32 {
        self.image.width()
    }

    pub fn paste(&self, frame: &mut RgbImage) {
        overlay_rgba(frame, &self.image, self.x, self.y, 1.0);
    }
}
