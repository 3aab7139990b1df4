use image::RgbImage;

use super::{tint, Visualizer, VisualizerParams};
use crate::audio::features::FeatureFrame;
use crate::render::canvas::{fill_rect, scale_color, Color};

/// Equaliser bars standing on a baseline at 80% height, with a reflection.
pub struct BarsVisualizer {
    width: u32,
    height: u32,
    color: Color,
}

impl BarsVisualizer {
    pub fn new(params: &VisualizerParams) -> Self {
        Self {
            width: params.width,
            height: params.height,
            color: params.color,
        }
    }
}

impl Visualizer for BarsVisualizer {
    fn name(&self) -> &'static str {
        "bars"
    }

    fn draw(&self, canvas: &mut RgbImage, frame: FeatureFrame<'_>, _data_index: usize) {
        let n = frame.bands.len();
        if n == 0 {
            return;
        }
        let slot = self.width as f32 / n as f32;
        let (bar_width, gap) = (slot * 0.8, slot * 0.2);
        let max_height = self.height as f32 * 0.6;
        let base_y = self.height as f32 * 0.8;

        for (i, &val) in frame.bands.iter().enumerate() {
            let x = i as f32 * slot + gap / 2.0;
            let bar_height = val * max_height * (0.5 + frame.amplitude * 0.5);
            let k = 0.5 + val * 0.5;
            let color = tint(self.color, k, k, k);

            fill_rect(
                canvas,
                x as i32,
                (base_y - bar_height) as i32,
                bar_width.ceil() as i32,
                bar_height.ceil() as i32,
                color,
                1.0,
            );
            fill_rect(
                canvas,
                x as i32,
                base_y as i32,
                bar_width.ceil() as i32,
                (bar_height * 0.3).ceil() as i32,
                scale_color(color, 0.3),
                1.0,
            );
        }
    }
}
