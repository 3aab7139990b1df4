use image::RgbImage;

use super::{tint, Visualizer, VisualizerParams};
use crate::audio::features::{FeatureFrame, FeatureFrameSet};
use crate::render::canvas::{fill_rect, scale_color, Color, WHITE};

/// Per-frame multiplier applied to a peak that was not refreshed.
pub const PEAK_DECAY: f32 = 0.95;

fn bar_value(band: f32, amplitude: f32) -> f32 {
    band * (0.6 + amplitude * 0.4)
}

/// Peak-hold levels for every data index, folded forward from silence.
///
/// A peak jumps to the current bar value when exceeded and otherwise decays
/// by [`PEAK_DECAY`] per data index.
pub fn peak_track(features: &FeatureFrameSet) -> Vec<Vec<f32>> {
    let mut peaks = vec![0.0f32; features.n_bands()];
    (0..features.len())
        .map(|i| {
            let frame = features.frame(i);
            for (peak, &band) in peaks.iter_mut().zip(frame.bands) {
                let value = bar_value(band, frame.amplitude);
                if value > *peak {
                    *peak = value;
                } else {
                    *peak *= PEAK_DECAY;
                }
            }
            peaks.clone()
        })
        .collect()
}

/// Spectrum analyser bars with a glow cap, reflection and peak-hold markers.
pub struct SpectrumVisualizer {
    width: u32,
    height: u32,
    color: Color,
    peaks: Vec<Vec<f32>>,
}

impl SpectrumVisualizer {
    pub fn new(params: &VisualizerParams, features: &FeatureFrameSet) -> Self {
        Self {
            width: params.width,
            height: params.height,
            color: params.color,
            peaks: peak_track(features),
        }
    }
}

impl Visualizer for SpectrumVisualizer {
    fn name(&self) -> &'static str {
        "spectrum"
    }

    fn draw(&self, canvas: &mut RgbImage, frame: FeatureFrame<'_>, data_index: usize) {
        let n = frame.bands.len();
        if n == 0 {
            return;
        }
        let peaks = self
            .peaks
            .get(data_index.min(self.peaks.len().saturating_sub(1)))
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let slot = self.width as f32 / n as f32;
        let (bar_width, gap) = (slot * 0.85, slot * 0.15);
        let max_height = self.height as f32 * 0.7;
        let base_y = self.height as f32 * 0.85;
        let w = bar_width.ceil() as i32;

        for (i, &band) in frame.bands.iter().enumerate() {
            let x = (i as f32 * slot + gap / 2.0) as i32;
            let bar_height = bar_value(band, frame.amplitude) * max_height;
            let ratio = i as f32 / n as f32;
            let color = tint(self.color, 1.0 - ratio * 0.3, 0.7 + ratio * 0.3, 0.7 + ratio * 0.3);

            if bar_height > 2.0 {
                let top = (base_y - bar_height) as i32;
                fill_rect(canvas, x, top, w, bar_height.ceil() as i32, color, 1.0);
                fill_rect(canvas, x - 1, top - 2, w + 2, 2, scale_color(color, 0.3), 1.0);
            }

            if let Some(&peak) = peaks.get(i) {
                let peak_y = (base_y - peak * max_height) as i32;
                fill_rect(canvas, x, peak_y - 3, w, 3, WHITE, 1.0);
            }

            fill_rect(
                canvas,
                x,
                base_y as i32,
                w,
                (bar_height * 0.2).ceil() as i32,
                scale_color(color, 0.15),
                1.0,
            );
        }
    }
}
