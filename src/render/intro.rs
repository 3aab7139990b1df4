use image::imageops::FilterType;
use image::RgbImage;

use super::animation::{avatar_pulse, Animation, AnimationState, IntroAnimations};
use super::avatar::PlacedAvatar;
use super::canvas::{luminance, overlay_rgba, scale_color, Color, BLACK, WHITE};
use super::text::{MeasureText, TextRenderer};
use crate::subtitle::render::smart_wrap_text;

const TITLE_LINE_SPACING: f32 = 10.0;
const SUBTITLE_GAP: f32 = 60.0;
const SUBTITLE_INTENSITY: f32 = 0.7;
const TITLE_WRAP: f32 = 0.8;

/// Length of the avatar pulse in animated intros.
pub const AVATAR_PULSE_SECONDS: f32 = 2.0;

pub fn title_font_size(width: u32) -> f32 {
    (width / 15).max(48) as f32
}

pub fn intro_avatar_size(width: u32, height: u32) -> u32 {
    width.min(height) / 5
}

#[derive(Clone, Debug, PartialEq)]
pub struct IntroTitle {
    pub title: String,
    pub subtitle: Option<String>,
    pub color: Color,
}

/// Draw the centred title block with a drop shadow.
///
/// Layout is computed at the base font size so the block does not drift as
/// the scale animation runs; each line is then drawn at the scaled size
/// centred on its base position.
pub fn draw_intro_title(
    img: &mut RgbImage,
    font: &TextRenderer,
    title: &IntroTitle,
    title_state: &AnimationState,
    subtitle_state: &AnimationState,
) {
    let (width, height) = (img.width() as f32, img.height() as f32);
    let base = font.with_size(title_font_size(img.width()));
    let scaled = base.with_size((base.size() * title_state.scale).trunc());

    let dark_text = luminance(title.color) / 255.0 > 0.5;
    let shadow = if dark_text { BLACK } else { WHITE };
    let shadow_alpha = if dark_text { 180.0 / 255.0 } else { 120.0 / 255.0 };

    let lines = smart_wrap_text(&base, &title.title, (width * TITLE_WRAP).floor());
    let line_height = base.line_height();
    let title_height =
        line_height * lines.len() as f32 + TITLE_LINE_SPACING * (lines.len() as f32 - 1.0);

    let sub_base = base.with_size((base.size() * 0.5).trunc());
    let sub_scaled = sub_base.with_size((sub_base.size() * subtitle_state.scale).trunc());
    let mut total_height = title_height;
    if title.subtitle.is_some() {
        total_height += SUBTITLE_GAP + sub_base.line_height();
    }

    let mut y = ((height - total_height) / 2.0).floor();
    let lift = (scaled.line_height() - line_height) / 2.0;
    for line in &lines {
        let x = ((width - scaled.text_width(line)) / 2.0).floor() + title_state.offset_x.trunc();
        let ly = y - lift + title_state.offset_y.trunc();
        scaled.draw(img, line, x + 2.0, ly + 2.0, shadow, shadow_alpha * title_state.opacity);
        scaled.draw(img, line, x, ly, title.color, title_state.opacity);
        y += line_height + TITLE_LINE_SPACING;
    }

    if let Some(subtitle) = &title.subtitle {
        let color = scale_color(title.color, SUBTITLE_INTENSITY);
        let opacity = SUBTITLE_INTENSITY * subtitle_state.opacity;
        let lift = (sub_scaled.line_height() - sub_base.line_height()) / 2.0;
        let x = ((width - sub_scaled.text_width(subtitle)) / 2.0).floor()
            + subtitle_state.offset_x.trunc();
        let sy = y + SUBTITLE_GAP - TITLE_LINE_SPACING - lift + subtitle_state.offset_y.trunc();
        let shadow_opacity = shadow_alpha * title_state.opacity * subtitle_state.opacity;
        sub_scaled.draw(img, subtitle, x + 1.0, sy + 1.0, shadow, shadow_opacity);
        sub_scaled.draw(img, subtitle, x, sy, color, opacity);
    }
}

/// What the intro title is drawn over.
#[derive(Clone, Debug)]
pub enum IntroBackdrop {
    Still(RgbImage),
    /// Extracted video frames; indices past the end reuse the last frame.
    Video(Vec<RgbImage>),
}

impl IntroBackdrop {
    /// Wrap extracted video frames, degrading to `fallback` when the video
    /// produced nothing.
    pub fn from_video(frames: Vec<RgbImage>, fallback: RgbImage, needed: usize) -> Self {
        if frames.is_empty() {
            log::warn!("Intro video produced no frames; using still background");
            return Self::Still(fallback);
        }
        if frames.len() < needed {
            log::warn!(
                "Intro video has {} of {} frames; holding the last frame",
                frames.len(),
                needed
            );
        }
        Self::Video(frames)
    }

    pub fn frame(&self, index: usize) -> &RgbImage {
        match self {
            Self::Still(img) => img,
            Self::Video(frames) => &frames[index.min(frames.len() - 1)],
        }
    }
}

/// Frame source for the intro clip phase.
pub struct IntroClip {
    backdrop: IntroBackdrop,
    title: IntroTitle,
    font: Option<TextRenderer>,
    animations: IntroAnimations,
    avatar: Option<PlacedAvatar>,
    avatar_animation: Animation,
    animated: bool,
    fps: u32,
    frame_count: usize,
    /// Composed once when nothing varies between frames.
    fixed: Option<RgbImage>,
}

impl IntroClip {
    pub fn new(
        backdrop: IntroBackdrop,
        title: IntroTitle,
        font: Option<TextRenderer>,
        animated: bool,
        fps: u32,
        frame_count: usize,
    ) -> Self {
        Self {
            backdrop,
            title,
            font,
            animations: IntroAnimations::standard(1.0, 0.3, 0.5),
            avatar: None,
            avatar_animation: avatar_pulse(AVATAR_PULSE_SECONDS),
            animated,
            fps: fps.max(1),
            frame_count,
            fixed: None,
        }
        .prepare()
    }

    /// Place `avatar` centred horizontally in the upper quarter.
    pub fn with_avatar(mut self, avatar: image::RgbaImage) -> Self {
        let (w, h) = self.backdrop.frame(0).dimensions();
        let size = avatar.width() as i32;
        self.avatar = Some(PlacedAvatar {
            x: (w as i32 - size) / 2,
            y: h as i32 / 4 - size / 2,
            image: avatar,
        });
        self.fixed = None;
        self.prepare()
    }

    fn prepare(mut self) -> Self {
        if !self.animated && matches!(self.backdrop, IntroBackdrop::Still(_)) {
            self.fixed = Some(self.compose(0));
        }
        self
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn frame(&self, index: usize) -> RgbImage {
        match &self.fixed {
            Some(frame) => frame.clone(),
            None => self.compose(index),
        }
    }

    fn compose(&self, index: usize) -> RgbImage {
        let mut img = self.backdrop.frame(index).clone();
        let time = index as f32 / self.fps as f32;
        let state_at = |anim: &Animation| {
            if self.animated {
                anim.evaluate(time)
            } else {
                anim.end_state()
            }
        };

        if let Some(font) = &self.font {
            draw_intro_title(
                &mut img,
                font,
                &self.title,
                &state_at(&self.animations.title),
                &state_at(&self.animations.subtitle),
            );
        }

        if let Some(avatar) = &self.avatar {
            let state = state_at(&self.avatar_animation);
            paste_scaled(&mut img, avatar, &state);
        }
        img
    }
}

fn paste_scaled(img: &mut RgbImage, avatar: &PlacedAvatar, state: &AnimationState) {
    if state.opacity <= 0.0 {
        return;
    }
    if (state.scale - 1.0).abs() < 1e-3 {
        overlay_rgba(img, &avatar.image, avatar.x, avatar.y, state.opacity);
        return;
    }
    let size = avatar.size();
    let scaled_size = ((size as f32 * state.scale).round() as u32).max(1);
    let scaled = image::imageops::resize(&avatar.image, scaled_size, scaled_size, FilterType::Triangle);
    let shift = (scaled_size as i32 - size as i32) / 2;
    overlay_rgba(img, &scaled, avatar.x - shift, avatar.y - shift, state.opacity);
}
