use image::RgbImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

use super::{Visualizer, VisualizerParams};
use crate::audio::features::FeatureFrame;
use crate::render::canvas::{fill_circle, Color};

const PARTICLE_COUNT: usize = 200;
/// Particles are spread over this many band slots regardless of band count.
const BAND_SLOTS: usize = 64;

#[derive(Clone, Debug, PartialEq)]
struct Particle {
    angle: f32,
    base_radius: f32,
    angular_velocity: f32,
    size: f32,
    band: usize,
}

/// Particles orbiting the centre, pushed outward by amplitude.
///
/// The layout comes from a seeded RNG and the orbit angle is a function of
/// the data index, so any frame can be drawn independently.
pub struct ParticlesVisualizer {
    width: u32,
    height: u32,
    color: Color,
    particles: Vec<Particle>,
}

impl ParticlesVisualizer {
    pub fn new(params: &VisualizerParams) -> Self {
        let mut rng = StdRng::seed_from_u64(params.seed);
        let min_dim = params.width.min(params.height) as f32;
        let particles = (0..PARTICLE_COUNT)
            .map(|i| {
                let direction = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                Particle {
                    angle: rng.gen_range(0.0..TAU),
                    base_radius: rng.gen_range(0.15..0.4) * min_dim,
                    angular_velocity: rng.gen_range(0.005..0.02) * direction,
                    size: rng.gen_range(2.0..6.0),
                    band: i * BAND_SLOTS / PARTICLE_COUNT,
                }
            })
            .collect();
        Self {
            width: params.width,
            height: params.height,
            color: params.color,
            particles,
        }
    }
}

impl Visualizer for ParticlesVisualizer {
    fn name(&self) -> &'static str {
        "particles"
    }

    fn draw(&self, canvas: &mut RgbImage, frame: FeatureFrame<'_>, data_index: usize) {
        if frame.bands.is_empty() {
            return;
        }
        let cx = (self.width / 2) as f32;
        let cy = (self.height / 2) as f32;
        let alpha = (150.0 + frame.amplitude * 100.0).min(255.0) / 255.0;

        for p in &self.particles {
            let band = frame.bands[p.band.min(frame.bands.len() - 1)];
            let angle = p.angle + p.angular_velocity * (data_index + 1) as f32;
            let radius = p.base_radius * (1.0 + frame.amplitude * 0.5 + band * 0.3);
            let (x, y) = (cx + radius * angle.cos(), cy + radius * angle.sin());
            let size = p.size * (1.0 + band * 0.5);

            let ratio = p.band as f32 / BAND_SLOTS as f32;
            let color = [
                (self.color[0] as f32 * (1.0 - ratio * 0.5) + 255.0 * ratio * 0.5).min(255.0) as u8,
                (self.color[1] as f32 * (1.0 - ratio * 0.3)).min(255.0) as u8,
                (self.color[2] as f32 * (1.0 - ratio * 0.2) + 100.0 * ratio).min(255.0) as u8,
            ];

            fill_circle(canvas, x, y, size, color, alpha);
            if band > 0.5 {
                fill_circle(canvas, x, y, size * 2.0, color, 50.0 * band / 255.0);
            }
        }
    }
}
