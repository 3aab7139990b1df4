//! Audio-reactive frame producers.
//!
//! Each style draws one frame from a background and the feature frame at a
//! data index. Rendering takes `&self` and never depends on the previous
//! frame, so frames can be produced on any thread in any order.

mod bars;
mod particles;
mod radial;
mod spectrum;
mod waveform;

pub use bars::BarsVisualizer;
pub use particles::ParticlesVisualizer;
pub use radial::RadialVisualizer;
pub use spectrum::{peak_track, SpectrumVisualizer};
pub use waveform::WaveformVisualizer;

use image::RgbImage;

use crate::audio::features::{FeatureFrame, FeatureFrameSet};
use crate::render::canvas::Color;

pub const DEFAULT_STYLE: &str = "waveform";

/// Everything a style needs besides the per-frame features.
#[derive(Clone, Debug)]
pub struct VisualizerParams {
    pub width: u32,
    pub height: u32,
    pub color: Color,
    /// Diameter of the centred avatar, when one is drawn.
    pub avatar_size: Option<u32>,
    pub seed: u64,
}

pub trait Visualizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Draw the visualization for `data_index` over `canvas`.
    fn draw(&self, canvas: &mut RgbImage, frame: FeatureFrame<'_>, data_index: usize);

    fn render(&self, background: &RgbImage, features: &FeatureFrameSet, data_index: usize) -> RgbImage {
        let mut canvas = background.clone();
        if !features.is_empty() {
            self.draw(&mut canvas, features.frame(data_index), data_index);
        }
        canvas
    }
}

type Factory = fn(&VisualizerParams, &FeatureFrameSet) -> Box<dyn Visualizer>;

fn waveform(p: &VisualizerParams, _: &FeatureFrameSet) -> Box<dyn Visualizer> {
    Box::new(WaveformVisualizer::new(p))
}

fn bars(p: &VisualizerParams, _: &FeatureFrameSet) -> Box<dyn Visualizer> {
    Box::new(BarsVisualizer::new(p))
}

fn radial(p: &VisualizerParams, _: &FeatureFrameSet) -> Box<dyn Visualizer> {
    Box::new(RadialVisualizer::new(p))
}

fn spectrum(p: &VisualizerParams, f: &FeatureFrameSet) -> Box<dyn Visualizer> {
    Box::new(SpectrumVisualizer::new(p, f))
}

fn particles(p: &VisualizerParams, _: &FeatureFrameSet) -> Box<dyn Visualizer> {
    Box::new(ParticlesVisualizer::new(p))
}

const STYLES: &[(&str, Factory)] = &[
    ("waveform", waveform),
    ("bars", bars),
    ("radial", radial),
    ("spectrum", spectrum),
    ("particles", particles),
];

pub fn available_styles() -> impl Iterator<Item = &'static str> {
    STYLES.iter().map(|(name, _)| *name)
}

/// Build the visualizer for `style`, falling back to the waveform for
/// unknown names.
pub fn create(style: &str, params: &VisualizerParams, features: &FeatureFrameSet) -> Box<dyn Visualizer> {
    let factory = STYLES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(style))
        .map(|(_, factory)| *factory)
        .unwrap_or_else(|| {
            log::warn!(
                "Unknown visualizer style '{}', using '{}'. Available: {}",
                style,
                DEFAULT_STYLE,
                available_styles().collect::<Vec<_>>().join(", ")
            );
            STYLES[0].1
        });
    let vis = factory(params, features);
    log::info!("Visualizer: {}", vis.name());
    vis
}

/// Scale each channel of `color`, saturating at 255.
pub(crate) fn tint(color: Color, r: f32, g: f32, b: f32) -> Color {
    [
        (color[0] as f32 * r).min(255.0) as u8,
        (color[1] as f32 * g).min(255.0) as u8,
        (color[2] as f32 * b).min(255.0) as u8,
    ]
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::Rgb;

    pub fn params() -> VisualizerParams {
        VisualizerParams {
            width: 160,
            height: 90,
            color: [0, 200, 255],
            avatar_size: None,
            seed: 7,
        }
    }

    /// Three frames: silent, loud, medium.
    pub fn features() -> FeatureFrameSet {
        let waveform = |v: f32| (0..200).map(|i| if i % 2 == 0 { v } else { -v }).collect();
        FeatureFrameSet::from_parts(
            vec![0.0, 1.0, 0.5],
            vec![vec![0.0; 16], vec![1.0; 16], vec![0.5; 16]],
            vec![waveform(0.0), waveform(0.8), waveform(0.4)],
        )
    }

    pub fn background() -> RgbImage {
        RgbImage::from_pixel(160, 90, Rgb([0, 0, 0]))
    }

    pub fn changed_pixels(a: &RgbImage, b: &RgbImage) -> usize {
        a.pixels().zip(b.pixels()).filter(|(p, q)| p != q).count()
    }

    #[test]
    fn registry_knows_all_styles() {
        let names: Vec<_> = available_styles().collect();
        assert_eq!(names, vec!["waveform", "bars", "radial", "spectrum", "particles"]);
        for name in names {
            assert_eq!(create(name, &params(), &features()).name(), name);
        }
    }

    #[test]
    fn unknown_style_falls_back_to_waveform() {
        assert_eq!(create("laser", &params(), &features()).name(), "waveform");
        assert_eq!(create("BARS", &params(), &features()).name(), "bars");
    }

    #[test]
    fn every_style_reacts_to_loud_frame() {
        let bg = background();
        let features = features();
        for name in available_styles() {
            let vis = create(name, &params(), &features);
            let loud = vis.render(&bg, &features, 1);
            assert!(changed_pixels(&bg, &loud) > 0, "{} drew nothing", name);
        }
    }

    #[test]
    fn rendering_is_repeatable() {
        let bg = background();
        let features = features();
        for name in available_styles() {
            let vis = create(name, &params(), &features);
            assert_eq!(vis.render(&bg, &features, 2), vis.render(&bg, &features, 2), "{}", name);
        }
    }

    #[test]
    fn tint_saturates() {
        assert_eq!(tint([200, 100, 10], 2.0, 0.5, 1.0), [255, 50, 10]);
    }
}
