//! Frame index -> phase mapping for the raw video stream.
//!
//! Output frames are laid out as `[intro clip][main body]`. The last
//! `fade_frames` of the intro cross-dissolve into the first main frame. The
//! end screen is appended later by concatenation and never passes through
//! here.

use crate::subtitle::cue::{SubtitleLookup, SubtitleSegment};

/// Length of the intro -> main cross-dissolve.
pub const FADE_SECONDS: f64 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TimelinePhase {
    IntroClip {
        intro_index: usize,
    },
    /// Tail of the intro blended toward main-body frame `main_index`;
    /// `alpha` is the main frame's weight.
    FadeTransition {
        intro_index: usize,
        main_index: usize,
        alpha: f32,
    },
    MainBody {
        data_index: usize,
    },
}

/// Everything needed to produce one output frame.
#[derive(Clone, Copy, Debug)]
pub struct FramePlan<'a> {
    pub index: usize,
    pub phase: TimelinePhase,
    pub subtitle: Option<&'a str>,
}

/// Frame counts derived from the render settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimelineConfig {
    pub fps: u32,
    pub intro_clip_frames: usize,
    pub fade_frames: usize,
    /// Positive delays the visualizer behind the audio, negative advances it.
    pub sync_offset_frames: i64,
}

impl TimelineConfig {
    /// `intro_clip_seconds` is `None` when no intro title is configured.
    pub fn new(fps: u32, intro_clip_seconds: Option<f64>, wave_sync_seconds: f64) -> Self {
        let intro_clip_frames = intro_clip_seconds
            .map_or(0, |secs| (secs.max(0.0) * fps as f64) as usize);
        Self {
            fps,
            intro_clip_frames,
            fade_frames: (fps as f64 * FADE_SECONDS) as usize,
            sync_offset_frames: (wave_sync_seconds * fps as f64) as i64,
        }
    }
}

pub struct TimelineScheduler {
    config: TimelineConfig,
    n_frames: usize,
    subtitles: SubtitleLookup,
}

impl TimelineScheduler {
    pub fn new(config: TimelineConfig, n_frames: usize, subtitles: Vec<SubtitleSegment>) -> Self {
        let subtitles = SubtitleLookup::build(subtitles, config.fps, config.intro_clip_frames);
        log::info!(
            "Timeline: {} intro frames ({} fading), {} main frames, sync offset {} frames",
            config.intro_clip_frames,
            config.fade_frames.min(config.intro_clip_frames),
            n_frames,
            config.sync_offset_frames
        );
        Self {
            config,
            n_frames,
            subtitles,
        }
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    pub fn intro_frames(&self) -> usize {
        self.config.intro_clip_frames
    }

    pub fn total_frames(&self) -> usize {
        self.config.intro_clip_frames + self.n_frames
    }

    /// Feature index driving the visualizer at output frame `index`.
    pub fn data_index(&self, index: usize) -> usize {
        let raw = index as i64
            - self.config.intro_clip_frames as i64
            - self.config.sync_offset_frames;
        raw.clamp(0, self.n_frames.saturating_sub(1) as i64) as usize
    }

    pub fn phase_at(&self, index: usize) -> TimelinePhase {
        let intro = self.config.intro_clip_frames;
        if index >= intro {
            return TimelinePhase::MainBody {
                data_index: self.data_index(index),
            };
        }

        let fade = self.config.fade_frames as i64;
        let fade_start = intro as i64 - fade;
        if fade > 0 && index as i64 >= fade_start {
            TimelinePhase::FadeTransition {
                intro_index: index,
                main_index: 0,
                alpha: (index as i64 - fade_start) as f32 / fade as f32,
            }
        } else {
            TimelinePhase::IntroClip { intro_index: index }
        }
    }

    pub fn plan(&self, index: usize) -> FramePlan<'_> {
        FramePlan {
            index,
            phase: self.phase_at(index),
            subtitle: self.subtitles.text_at(index),
        }
    }

    pub fn plans(&self) -> impl Iterator<Item = FramePlan<'_>> + '_ {
        (0..self.total_frames()).map(move |i| self.plan(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler(intro_secs: Option<f64>, sync: f64, n_frames: usize) -> TimelineScheduler {
        TimelineScheduler::new(TimelineConfig::new(30, intro_secs, sync), n_frames, Vec::new())
    }

    #[test]
    fn config_derives_frame_counts() {
        let cfg = TimelineConfig::new(30, Some(3.0), 0.1);
        assert_eq!(cfg.intro_clip_frames, 90);
        assert_eq!(cfg.fade_frames, 15);
        assert_eq!(cfg.sync_offset_frames, 3);

        let cfg = TimelineConfig::new(30, None, -0.1);
        assert_eq!(cfg.intro_clip_frames, 0);
        assert_eq!(cfg.sync_offset_frames, -3);
    }

    #[test]
    fn total_is_intro_plus_main() {
        assert_eq!(scheduler(Some(3.0), 0.0, 300).total_frames(), 390);
        assert_eq!(scheduler(None, 0.0, 300).total_frames(), 300);
    }

    #[test]
    fn phases_partition_frames() {
        let s = scheduler(Some(3.0), 0.0, 100);
        assert_eq!(s.phase_at(0), TimelinePhase::IntroClip { intro_index: 0 });
        assert_eq!(s.phase_at(74), TimelinePhase::IntroClip { intro_index: 74 });
        assert_eq!(
            s.phase_at(75),
            TimelinePhase::FadeTransition {
                intro_index: 75,
                main_index: 0,
                alpha: 0.0
            }
        );
        match s.phase_at(89) {
            TimelinePhase::FadeTransition { alpha, .. } => {
                assert!((alpha - 14.0 / 15.0).abs() < 1e-6)
            }
            other => panic!("unexpected phase {:?}", other),
        }
        assert_eq!(s.phase_at(90), TimelinePhase::MainBody { data_index: 0 });
        assert_eq!(s.phase_at(189), TimelinePhase::MainBody { data_index: 99 });
    }

    #[test]
    fn no_intro_means_main_from_zero() {
        let s = scheduler(None, 0.0, 10);
        assert_eq!(s.phase_at(0), TimelinePhase::MainBody { data_index: 0 });
        assert!(s.plans().all(|p| matches!(p.phase, TimelinePhase::MainBody { .. })));
    }

    #[test]
    fn short_intro_fades_from_first_frame() {
        // 0.25s intro at 30fps = 7 frames, shorter than the 15 frame fade
        let s = scheduler(Some(0.25), 0.0, 10);
        match s.phase_at(0) {
            TimelinePhase::FadeTransition { alpha, .. } => {
                assert!((alpha - 8.0 / 15.0).abs() < 1e-6)
            }
            other => panic!("unexpected phase {:?}", other),
        }
    }

    #[test]
    fn positive_sync_delays_visualizer() {
        let s = scheduler(Some(3.0), 0.2, 100); // 6 frames
        assert_eq!(s.data_index(90), 0);
        assert_eq!(s.data_index(95), 0);
        assert_eq!(s.data_index(96), 0);
        assert_eq!(s.data_index(97), 1);
        assert_eq!(s.data_index(189), 93);
    }

    #[test]
    fn negative_sync_advances_visualizer() {
        let s = scheduler(Some(3.0), -0.2, 100);
        assert_eq!(s.data_index(90), 6);
        assert_eq!(s.data_index(183), 99);
        assert_eq!(s.data_index(189), 99);
    }

    #[test]
    fn data_index_matches_clamp_formula() {
        for sync in [-0.5, -0.1, 0.0, 0.1, 0.5] {
            let s = scheduler(Some(2.0), sync, 50);
            let intro = s.intro_frames() as i64;
            let offset = s.config().sync_offset_frames;
            for i in s.intro_frames()..s.total_frames() {
                let expected = (i as i64 - intro - offset).clamp(0, 49) as usize;
                assert_eq!(s.data_index(i), expected);
            }
        }
    }

    #[test]
    fn plan_carries_shifted_subtitles() {
        let subs = vec![SubtitleSegment::new("hi", 1000, 1500).unwrap()];
        let s = TimelineScheduler::new(TimelineConfig::new(30, Some(3.0), 0.0), 300, subs);
        assert_eq!(s.plan(119).subtitle, None);
        assert_eq!(s.plan(120).subtitle, Some("hi"));
        assert_eq!(s.plan(135).subtitle, Some("hi"));
        assert_eq!(s.plan(136).subtitle, None);
    }
}
