use image::RgbImage;

use crate::render::canvas::{fill_rounded_rect, Color, BLACK, WHITE};
use crate::render::text::{MeasureText, TextRenderer};

/// Characters after which a title line may break naturally.
const BREAK_AFTER: &[char] = &['?', '!', '.', ',', '-', '\u{2014}', ':'];

#[derive(Clone, Debug, PartialEq)]
pub struct SubtitleStyle {
    pub color: Color,
    /// Vertical anchor as a fraction of frame height.
    pub anchor_y: f32,
    /// Wrap width as a fraction of frame width.
    pub max_width: f32,
    pub padding: f32,
    pub line_spacing: f32,
    pub box_radius: i32,
    pub box_alpha: u8,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            color: WHITE,
            anchor_y: 0.85,
            max_width: 0.9,
            padding: 12.0,
            line_spacing: 6.0,
            box_radius: 10,
            box_alpha: 180,
        }
    }
}

/// Default subtitle font size for a frame height.
pub fn default_font_size(height: u32) -> f32 {
    (height / 20).max(24) as f32
}

/// Greedy word wrap. A single word wider than `max_width` gets its own line.
pub fn wrap_text(measure: &impl MeasureText, text: &str, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if measure.text_width(&candidate) <= max_width || current.is_empty() {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    if lines.is_empty() {
        vec![text.to_string()]
    } else {
        lines
    }
}

/// Wrap for titles: prefer breaking after punctuation, otherwise split into
/// two lines of balanced width, falling back to [`wrap_text`].
pub fn smart_wrap_text(measure: &impl MeasureText, text: &str, max_width: f32) -> Vec<String> {
    let fits = |s: &str| measure.text_width(s) <= max_width;
    if fits(text) {
        return vec![text.to_string()];
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= 2 {
        return wrap_text(measure, text, max_width);
    }
    let join = |range: &[&str]| range.join(" ");

    // last punctuation break whose first part still fits
    let punct_break = (0..words.len() - 1)
        .filter(|&i| words[i].ends_with(BREAK_AFTER))
        .filter(|&i| fits(&join(&words[..=i])))
        .map(|i| i + 1)
        .last();

    if let Some(split) = punct_break.filter(|&s| s < words.len() - 1) {
        let first = join(&words[..split]);
        let rest = join(&words[split..]);
        if fits(&rest) {
            return vec![first, rest];
        }
        let mut lines = vec![first];
        lines.extend(smart_wrap_text(measure, &rest, max_width));
        return lines;
    }

    let mid = words.len() / 2;
    let mut best_split = mid;
    let mut best_diff = f32::INFINITY;
    for i in mid.saturating_sub(2).max(1)..(mid + 3).min(words.len() - 1) {
        let w1 = measure.text_width(&join(&words[..i]));
        let w2 = measure.text_width(&join(&words[i..]));
        if w1 <= max_width && w2 <= max_width && (w1 - w2).abs() < best_diff {
            best_diff = (w1 - w2).abs();
            best_split = i;
        }
    }

    let first = join(&words[..best_split]);
    let rest = join(&words[best_split..]);
    if !fits(&first) {
        return wrap_text(measure, text, max_width);
    }
    if !fits(&rest) {
        let mut lines = vec![first];
        lines.extend(smart_wrap_text(measure, &rest, max_width));
        return lines;
    }
    vec![first, rest]
}

/// Placement of a wrapped subtitle block.
#[derive(Clone, Debug, PartialEq)]
pub struct SubtitleLayout {
    /// Each line with its top-left corner.
    pub lines: Vec<(String, f32, f32)>,
    /// Background box as x, y, width, height.
    pub bbox: (f32, f32, f32, f32),
}

pub fn layout_subtitle(
    measure: &impl MeasureText,
    text: &str,
    width: u32,
    height: u32,
    style: &SubtitleStyle,
) -> SubtitleLayout {
    let (w, h) = (width as f32, height as f32);
    let lines = wrap_text(measure, text, (w * style.max_width).floor());
    let line_height = measure.line_height();
    let widths: Vec<f32> = lines.iter().map(|l| measure.text_width(l)).collect();
    let block_height =
        line_height * lines.len() as f32 + style.line_spacing * (lines.len() as f32 - 1.0);
    let block_width = widths.iter().cloned().fold(0.0, f32::max);

    // keep the box on-frame when the anchor is too low for the block
    let anchor = (h * style.anchor_y).floor();
    let y = anchor
        .min(h - block_height - style.padding * 2.0 - 10.0)
        .max(style.padding);

    let placed = lines
        .into_iter()
        .zip(&widths)
        .enumerate()
        .map(|(i, (line, lw))| {
            let ly = y + i as f32 * (line_height + style.line_spacing);
            (line, ((w - lw) / 2.0).floor(), ly)
        })
        .collect();

    SubtitleLayout {
        lines: placed,
        bbox: (
            ((w - block_width) / 2.0).floor() - style.padding,
            y - style.padding,
            block_width + style.padding * 2.0,
            block_height + style.padding * 2.0,
        ),
    }
}

/// Draw `text` on a rounded translucent box near the bottom of the frame.
pub fn draw_subtitle(img: &mut RgbImage, text: &TextRenderer, content: &str, style: &SubtitleStyle) {
    let layout = layout_subtitle(text, content, img.width(), img.height(), style);
    let (bx, by, bw, bh) = layout.bbox;
    fill_rounded_rect(
        img,
        bx as i32,
        by as i32,
        bw.ceil() as i32,
        bh.ceil() as i32,
        style.box_radius,
        BLACK,
        style.box_alpha as f32 / 255.0,
    );
    for (line, x, y) in &layout.lines {
        text.draw(img, line, *x, *y, style.color, 1.0);
    }
}
