use image::RgbImage;

use super::avatar::PlacedAvatar;
use super::canvas::blend_frames;
use super::intro::IntroClip;
use super::text::TextRenderer;
use crate::audio::features::FeatureFrameSet;
use crate::subtitle::render::{draw_subtitle, SubtitleStyle};
use crate::timeline::{FramePlan, TimelinePhase};
use crate::visualizer::Visualizer;

/// Seconds into the intro used for the thumbnail, once the title has settled.
const THUMBNAIL_INTRO_SECONDS: usize = 2;

/// Builds each output frame from its [`FramePlan`].
///
/// Main-body frames are the visualizer over the background with the avatar
/// pasted on top; the subtitle is drawn last on every phase. Nothing here is
/// mutated while rendering, so frames can be built from any thread.
pub struct Compositor {
    background: RgbImage,
    features: FeatureFrameSet,
    visualizer: Box<dyn Visualizer>,
    avatar: Option<PlacedAvatar>,
    intro: Option<IntroClip>,
    subtitles: Option<(TextRenderer, SubtitleStyle)>,
}

impl Compositor {
    pub fn new(background: RgbImage, features: FeatureFrameSet, visualizer: Box<dyn Visualizer>) -> Self {
        Self {
            background,
            features,
            visualizer,
            avatar: None,
            intro: None,
            subtitles: None,
        }
    }

    pub fn with_avatar(mut self, avatar: PlacedAvatar) -> Self {
        self.avatar = Some(avatar);
        self
    }

    pub fn with_intro(mut self, intro: IntroClip) -> Self {
        self.intro = Some(intro);
        self
    }

    pub fn with_subtitles(mut self, text: TextRenderer, style: SubtitleStyle) -> Self {
        self.subtitles = Some((text, style));
        self
    }

    pub fn main_frame(&self, data_index: usize) -> RgbImage {
        let mut frame = self.visualizer.render(&self.background, &self.features, data_index);
        if let Some(avatar) = &self.avatar {
            avatar.paste(&mut frame);
        }
        frame
    }

    fn intro_frame(&self, intro_index: usize) -> RgbImage {
        match &self.intro {
            Some(intro) => intro.frame(intro_index),
            None => self.main_frame(0),
        }
    }

    pub fn render(&self, plan: &FramePlan<'_>) -> RgbImage {
        let mut frame = match plan.phase {
            TimelinePhase::IntroClip { intro_index } => self.intro_frame(intro_index),
            TimelinePhase::FadeTransition {
                intro_index,
                main_index,
                alpha,
            } => blend_frames(&self.intro_frame(intro_index), &self.main_frame(main_index), alpha),
            TimelinePhase::MainBody { data_index } => self.main_frame(data_index),
        };
        if let (Some(content), Some((text, style))) = (plan.subtitle, &self.subtitles) {
            draw_subtitle(&mut frame, text, content, style);
        }
        frame
    }

    /// The settled intro frame, or the first main frame when there is no intro.
    pub fn thumbnail(&self, fps: u32) -> RgbImage {
        match &self.intro {
            Some(intro) if intro.frame_count() > 0 => {
                let index = (THUMBNAIL_INTRO_SECONDS * fps as usize).min(intro.frame_count() - 1);
                intro.frame(index)
            }
            _ => self.main_frame(0),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::render::intro::{IntroBackdrop, IntroTitle};
    use crate::subtitle::cue::SubtitleSegment;
    use crate::timeline::{TimelineConfig, TimelineScheduler};
    use crate::visualizer::tests::{background, features, params};
    use image::{Rgb, Rgba, RgbaImage};

    pub fn intro(frames: usize) -> IntroClip {
        let backdrop = IntroBackdrop::Still(RgbImage::from_pixel(160, 90, Rgb([90, 20, 20])));
        let title = IntroTitle {
            title: "Show".into(),
            subtitle: None,
            color: [255, 255, 255],
        };
        IntroClip::new(backdrop, title, None, false, 10, frames)
            .with_avatar(RgbaImage::from_pixel(10, 10, Rgba([0, 0, 255, 255])))
    }

    pub fn compositor(with_intro: bool) -> Compositor {
        let features = features();
        let vis = crate::visualizer::create("bars", &params(), &features);
        let avatar = PlacedAvatar::centered(RgbaImage::from_pixel(8, 8, Rgba([255, 0, 0, 255])), 160, 90);
        let c = Compositor::new(background(), features, vis).with_avatar(avatar);
        if with_intro {
            c.with_intro(intro(10))
        } else {
            c
        }
    }

    #[test]
    fn main_frames_carry_avatar() {
        let c = compositor(false);
        let frame = c.main_frame(1);
        assert_eq!(frame.get_pixel(80, 45).0, [255, 0, 0]);
        assert_ne!(frame, c.main_frame(0));
    }

    #[test]
    fn phases_pick_sources() {
        let c = compositor(true);
        let timeline = TimelineScheduler::new(TimelineConfig::new(10, Some(1.0), 0.0), 3, Vec::new());
        let intro0 = c.render(&timeline.plan(0));
        assert_eq!(intro0, intro(10).frame(0));

        // fade covers intro frames 5..10; frame 5 is pure intro
        assert_eq!(c.render(&timeline.plan(5)), intro(10).frame(5));
        let mid_fade = c.render(&timeline.plan(8));
        assert_ne!(mid_fade, intro0);
        assert_ne!(mid_fade, c.main_frame(0));

        assert_eq!(c.render(&timeline.plan(10)), c.main_frame(0));
        assert_eq!(c.render(&timeline.plan(12)), c.main_frame(2));
    }

    #[test]
    fn subtitle_needs_a_font() {
        let c = compositor(false);
        let segments = vec![SubtitleSegment::new("hello", 0, 100).unwrap()];
        let timeline = TimelineScheduler::new(TimelineConfig::new(10, None, 0.0), 3, segments);
        let plan = timeline.plan(0);
        assert_eq!(plan.subtitle, Some("hello"));
        assert_eq!(c.render(&plan), c.main_frame(0));
    }

    #[test]
    fn thumbnail_prefers_settled_intro() {
        let with_intro = compositor(true);
        // 2s at 10fps is past the 10 frame intro, so the last frame is used
        assert_eq!(with_intro.thumbnail(10), intro(10).frame(9));
        let plain = compositor(false);
        assert_eq!(plain.thumbnail(10), plain.main_frame(0));
    }
}
