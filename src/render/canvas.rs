//! Software drawing primitives on RGB frames.
//!
//! Everything alpha-blends in place and silently clips at the frame edge, so
//! callers never bounds-check.

use image::{Rgb, RgbImage, RgbaImage};

use crate::error::RenderError;

pub type Color = [u8; 3];

pub const WHITE: Color = [255, 255, 255];
pub const BLACK: Color = [0, 0, 0];

/// Parse `#rrggbb`, `rrggbb` or `#rgb`.
pub fn parse_hex(value: &str) -> Result<Color, RenderError> {
    let hex = value.trim().trim_start_matches('#');
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return Err(RenderError::Config(format!("invalid colour '{}'", value))),
    };
    let channel = |i: usize| {
        u8::from_str_radix(&expanded[i..i + 2], 16)
            .map_err(|_| RenderError::Config(format!("invalid colour '{}'", value)))
    };
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

/// Perceived luminance in 0..=255.
pub fn luminance(color: Color) -> f32 {
    0.299 * color[0] as f32 + 0.587 * color[1] as f32 + 0.114 * color[2] as f32
}

pub fn scale_color(color: Color, factor: f32) -> Color {
    color.map(|c| (c as f32 * factor).round().clamp(0.0, 255.0) as u8)
}

#[inline]
pub fn blend_pixel(img: &mut RgbImage, x: i32, y: i32, color: Color, alpha: f32) {
    if x < 0 || y < 0 || x >= img.width() as i32 || y >= img.height() as i32 || alpha <= 0.0 {
        return;
    }
    let px = img.get_pixel_mut(x as u32, y as u32);
    if alpha >= 1.0 {
        *px = Rgb(color);
        return;
    }
    let inv = 1.0 - alpha;
    for c in 0..3 {
        px.0[c] = (color[c] as f32 * alpha + px.0[c] as f32 * inv).round() as u8;
    }
}

pub fn fill_rect(img: &mut RgbImage, x: i32, y: i32, w: i32, h: i32, color: Color, alpha: f32) {
    for py in y.max(0)..(y + h).min(img.height() as i32) {
        for px in x.max(0)..(x + w).min(img.width() as i32) {
            blend_pixel(img, px, py, color, alpha);
        }
    }
}

pub fn fill_rounded_rect(
    img: &mut RgbImage,
    x: i32,
    y: i32,
    w: i32,
    h: i32,
    radius: i32,
    color: Color,
    alpha: f32,
) {
    let r = radius.min(w / 2).min(h / 2).max(0);
    let rf = r as f32;
    for py in y.max(0)..(y + h).min(img.height() as i32) {
        for px in x.max(0)..(x + w).min(img.width() as i32) {
            // distance into the nearest corner square, if any
            let dx = if px < x + r {
                (x + r - px) as f32 - 0.5
            } else if px >= x + w - r {
                (px - (x + w - r)) as f32 + 0.5
            } else {
                0.0
            };
            let dy = if py < y + r {
                (y + r - py) as f32 - 0.5
            } else if py >= y + h - r {
                (py - (y + h - r)) as f32 + 0.5
            } else {
                0.0
            };
            if dx > 0.0 && dy > 0.0 && dx * dx + dy * dy > rf * rf {
                continue;
            }
            blend_pixel(img, px, py, color, alpha);
        }
    }
}

/// Line with round caps of the given thickness.
pub fn draw_line(
    img: &mut RgbImage,
    from: (f32, f32),
    to: (f32, f32),
    thickness: f32,
    color: Color,
    alpha: f32,
) {
    let half = (thickness / 2.0).max(0.5);
    let (x0, y0) = from;
    let (x1, y1) = to;
    let min_x = (x0.min(x1) - half).floor() as i32;
    let max_x = (x0.max(x1) + half).ceil() as i32;
    let min_y = (y0.min(y1) - half).floor() as i32;
    let max_y = (y0.max(y1) + half).ceil() as i32;

    let dx = x1 - x0;
    let dy = y1 - y0;
    let len_sq = dx * dx + dy * dy;

    for py in min_y.max(0)..=max_y.min(img.height() as i32 - 1) {
        for px in min_x.max(0)..=max_x.min(img.width() as i32 - 1) {
            let (fx, fy) = (px as f32 + 0.5, py as f32 + 0.5);
            let t = if len_sq > 0.0 {
                (((fx - x0) * dx + (fy - y0) * dy) / len_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let cx = x0 + t * dx - fx;
            let cy = y0 + t * dy - fy;
            if cx * cx + cy * cy <= half * half {
                blend_pixel(img, px, py, color, alpha);
            }
        }
    }
}

pub fn draw_polyline(img: &mut RgbImage, points: &[(f32, f32)], thickness: f32, color: Color) {
    for pair in points.windows(2) {
        draw_line(img, pair[0], pair[1], thickness, color, 1.0);
    }
}

pub fn fill_circle(img: &mut RgbImage, cx: f32, cy: f32, radius: f32, color: Color, alpha: f32) {
    let r_sq = radius * radius;
    for py in (cy - radius).floor() as i32..=(cy + radius).ceil() as i32 {
        for px in (cx - radius).floor() as i32..=(cx + radius).ceil() as i32 {
            let dx = px as f32 + 0.5 - cx;
            let dy = py as f32 + 0.5 - cy;
            if dx * dx + dy * dy <= r_sq {
                blend_pixel(img, px, py, color, alpha);
            }
        }
    }
}

pub fn draw_ring(img: &mut RgbImage, cx: f32, cy: f32, radius: f32, thickness: f32, color: Color) {
    let outer = radius + thickness / 2.0;
    let inner = (radius - thickness / 2.0).max(0.0);
    for py in (cy - outer).floor() as i32..=(cy + outer).ceil() as i32 {
        for px in (cx - outer).floor() as i32..=(cx + outer).ceil() as i32 {
            let dx = px as f32 + 0.5 - cx;
            let dy = py as f32 + 0.5 - cy;
            let d_sq = dx * dx + dy * dy;
            if d_sq <= outer * outer && d_sq >= inner * inner {
                blend_pixel(img, px, py, color, 1.0);
            }
        }
    }
}

/// Linear cross-dissolve; `alpha` is the weight of `b`.
pub fn blend_frames(a: &RgbImage, b: &RgbImage, alpha: f32) -> RgbImage {
    let alpha = alpha.clamp(0.0, 1.0);
    let inv = 1.0 - alpha;
    let mut out = a.clone();
    for (dst, src) in out.iter_mut().zip(b.iter()) {
        *dst = (*dst as f32 * inv + *src as f32 * alpha).round() as u8;
    }
    out
}

/// Paste an RGBA image with its own alpha scaled by `opacity`.
pub fn overlay_rgba(dst: &mut RgbImage, src: &RgbaImage, x: i32, y: i32, opacity: f32) {
    for (sx, sy, px) in src.enumerate_pixels() {
        let a = px.0[3] as f32 / 255.0 * opacity;
        blend_pixel(
            dst,
            x + sx as i32,
            y + sy as i32,
            [px.0[0], px.0[1], px.0[2]],
            a,
        );
    }
}
