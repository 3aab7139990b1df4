use image::RgbImage;

use super::{Visualizer, VisualizerParams};
use crate::audio::features::FeatureFrame;
use crate::render::canvas::{draw_polyline, scale_color, Color};

/// Horizontal line through the frame centre with a dimmer mirror image.
pub struct WaveformVisualizer {
    width: u32,
    height: u32,
    color: Color,
}

impl WaveformVisualizer {
    pub fn new(params: &VisualizerParams) -> Self {
        Self {
            width: params.width,
            height: params.height,
            color: params.color,
        }
    }
}

impl Visualizer for WaveformVisualizer {
    fn name(&self) -> &'static str {
        "waveform"
    }

    fn draw(&self, canvas: &mut RgbImage, frame: FeatureFrame<'_>, _data_index: usize) {
        let n = frame.waveform.len();
        if n < 2 {
            return;
        }
        let scale = 0.3 + frame.amplitude * 0.7;
        let center_y = (self.height / 2) as f32;
        let max_height = self.height as f32 * 0.4;

        let points: Vec<(f32, f32)> = frame
            .waveform
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let x = (i as u64 * self.width as u64 / n as u64) as f32;
                (x, (center_y + v * max_height * scale).trunc())
            })
            .collect();
        draw_polyline(canvas, &points, 3.0, self.color);

        let mirrored: Vec<(f32, f32)> = points.iter().map(|&(x, y)| (x, 2.0 * center_y - y)).collect();
        draw_polyline(canvas, &mirrored, 2.0, scale_color(self.color, 0.5));
    }
}
