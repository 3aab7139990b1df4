use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::{Path, PathBuf};

use super::canvas::parse_hex;
use crate::config::defaults;
use crate::error::RenderError;

/// Searched by `random` when the value is not a directory.
pub const BACKGROUNDS_DIR: &str = "backgrounds";
const RANDOM_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Static backdrop every visualizer frame is drawn over.
#[derive(Clone, Debug, PartialEq)]
pub enum BackgroundSpec {
    Color(String),
    /// Two comma separated colours, top to bottom.
    Gradient(String),
    Image(PathBuf),
}

impl BackgroundSpec {
    pub fn parse(kind: &str, value: &str) -> Result<Self, RenderError> {
        match kind.to_ascii_lowercase().as_str() {
            "color" | "colour" | "solid" => Ok(Self::Color(value.to_string())),
            "gradient" => Ok(Self::Gradient(value.to_string())),
            "image" => Ok(Self::Image(PathBuf::from(value))),
            "random" => {
                let dir = Path::new(value);
                let dir = if dir.is_dir() { dir } else { Path::new(BACKGROUNDS_DIR) };
                Ok(Self::random(dir, &mut rand::thread_rng()))
            }
            other => Err(RenderError::Config(format!(
                "unknown background type '{}' (expected color, gradient, image or random)",
                other
            ))),
        }
    }

    /// Pick one image from `dir`, or the default colour when it has none.
    pub fn random<R: Rng + ?Sized>(dir: &Path, rng: &mut R) -> Self {
        let mut images: Vec<PathBuf> = std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok().map(|e| e.path()))
                    .filter(|p| {
                        p.extension()
                            .and_then(|e| e.to_str())
                            .is_some_and(|e| RANDOM_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                    })
                    .collect()
            })
            .unwrap_or_default();
        images.sort();

        match images.choose(rng) {
            Some(path) => {
                log::info!("Random background: {}", path.display());
                Self::Image(path.clone())
            }
            None => {
                log::warn!("No backgrounds found in {}, using default color", dir.display());
                Self::Color(defaults::BACKGROUND.to_string())
            }
        }
    }

    pub fn render(&self, width: u32, height: u32) -> Result<RgbImage, RenderError> {
        match self {
            Self::Color(hex) => Ok(RgbImage::from_pixel(width, height, Rgb(parse_hex(hex)?))),
            Self::Gradient(colors) => gradient(width, height, colors),
            Self::Image(path) => load_cover(path, width, height),
        }
    }
}

fn gradient(width: u32, height: u32, colors: &str) -> Result<RgbImage, RenderError> {
    let (top, bottom) = colors.split_once(',').ok_or_else(|| {
        RenderError::Config(format!("gradient needs two colours, got '{}'", colors))
    })?;
    let top = parse_hex(top)?;
    let bottom = parse_hex(bottom)?;

    Ok(RgbImage::from_fn(width, height, |_, y| {
        let ratio = y as f32 / height as f32;
        Rgb([0, 1, 2].map(|c| (top[c] as f32 * (1.0 - ratio) + bottom[c] as f32 * ratio) as u8))
    }))
}

/// Load an image and stretch it to exactly `width` x `height`.
pub fn load_cover(path: &std::path::Path, width: u32, height: u32) -> Result<RgbImage, RenderError> {
    let img = image::open(path).map_err(|e| RenderError::asset(path, e))?;
    Ok(image::imageops::resize(&img.to_rgb8(), width, height, FilterType::Lanczos3))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_fills_frame() {
        let bg = BackgroundSpec::parse("color", "#102030").unwrap().render(8, 4).unwrap();
        assert_eq!(bg.dimensions(), (8, 4));
        assert!(bg.pixels().all(|p| p.0 == [16, 32, 48]));
    }

    #[test]
    fn gradient_runs_top_to_bottom() {
        let bg = BackgroundSpec::parse("gradient", "#000000, #ffffff")
            .unwrap()
            .render(2, 10)
            .unwrap();
        assert_eq!(bg.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(bg.get_pixel(1, 5).0, [127, 127, 127]);
        assert!(bg.get_pixel(0, 9).0[0] > 200);
        assert_eq!(bg.get_pixel(0, 3), bg.get_pixel(1, 3));
    }

    #[test]
    fn gradient_needs_two_colours() {
        let spec = BackgroundSpec::Gradient("#ffffff".into());
        assert!(matches!(spec.render(4, 4), Err(RenderError::Config(_))));
    }

    #[test]
    fn image_is_resized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bg.png");
        RgbImage::from_pixel(3, 3, Rgb([200, 10, 10])).save(&path).unwrap();
        let bg = BackgroundSpec::Image(path).render(12, 6).unwrap();
        assert_eq!(bg.dimensions(), (12, 6));
        assert!(bg.get_pixel(6, 3).0[0] > 150);
    }

    #[test]
    fn missing_image_is_asset_error() {
        let spec = BackgroundSpec::Image(PathBuf::from("/nonexistent/bg.png"));
        assert!(matches!(spec.render(4, 4), Err(RenderError::Asset { .. })));
    }

    #[test]
    fn random_picks_an_image_from_dir() {
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let dir = tempfile::tempdir().unwrap();
        for name in ["a.png", "b.JPG", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            match BackgroundSpec::random(dir.path(), &mut rng) {
                BackgroundSpec::Image(path) => {
                    let name = path.file_name().unwrap().to_str().unwrap().to_string();
                    assert!(name == "a.png" || name == "b.JPG", "picked {}", name);
                }
                other => panic!("expected image, got {:?}", other),
            }
        }
    }

    #[test]
    fn random_without_images_uses_default_color() {
        let dir = tempfile::tempdir().unwrap();
        let spec = BackgroundSpec::parse("random", dir.path().to_str().unwrap()).unwrap();
        assert_eq!(spec, BackgroundSpec::Color(defaults::BACKGROUND.into()));
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(BackgroundSpec::parse("plasma", "x").is_err());
    }
}
