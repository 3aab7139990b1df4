use image::RgbImage;
use std::f32::consts::{FRAC_PI_2, TAU};

use super::{tint, Visualizer, VisualizerParams};
use crate::audio::features::FeatureFrame;
use crate::render::canvas::{draw_line, draw_ring, Color};

/// Gap between the avatar edge and the inner end of the bars.
const AVATAR_GAP: f32 = 10.0;

/// Bars radiating from the centre. With an avatar the bars start just
/// outside it; without one a pulsing ring marks the centre.
pub struct RadialVisualizer {
    width: u32,
    height: u32,
    color: Color,
    avatar_size: Option<u32>,
}

impl RadialVisualizer {
    pub fn new(params: &VisualizerParams) -> Self {
        Self {
            width: params.width,
            height: params.height,
            color: params.color,
            avatar_size: params.avatar_size,
        }
    }

    fn base_radius(&self) -> f32 {
        match self.avatar_size {
            Some(size) => size as f32 / 2.0 + AVATAR_GAP,
            None => self.width.min(self.height) as f32 * 0.15,
        }
    }
}

impl Visualizer for RadialVisualizer {
    fn name(&self) -> &'static str {
        "radial"
    }

    fn draw(&self, canvas: &mut RgbImage, frame: FeatureFrame<'_>, _data_index: usize) {
        let n = frame.bands.len();
        let cx = (self.width / 2) as f32;
        let cy = (self.height / 2) as f32;
        let base_radius = self.base_radius();
        let max_len = self.width.min(self.height) as f32 * 0.3;

        for (i, &val) in frame.bands.iter().enumerate() {
            let angle = TAU * i as f32 / n as f32 - FRAC_PI_2;
            let len = val * max_len * (0.5 + frame.amplitude * 0.5);
            let (sin, cos) = angle.sin_cos();
            let hue = i as f32 / n as f32;
            let color = tint(self.color, 1.0 - hue * 0.3, 0.7 + hue * 0.3, 0.7 + hue * 0.3);
            draw_line(
                canvas,
                (cx + cos * base_radius, cy + sin * base_radius),
                (cx + cos * (base_radius + len), cy + sin * (base_radius + len)),
                3.0,
                color,
                1.0,
            );
        }

        if self.avatar_size.is_none() {
            let r = base_radius * (0.8 + frame.amplitude * 0.2);
            draw_ring(canvas, cx, cy, r, 2.0, self.color);
        }
    }
}
