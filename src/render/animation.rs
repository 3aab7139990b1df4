//! Time-driven animation of overlay elements.
//!
//! An [`Animation`] is a pure function of elapsed time: evaluating it never
//! mutates anything, so the same time always yields the same
//! [`AnimationState`].

/// Visual state applied to an overlay element for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimationState {
    pub opacity: f32,
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    /// Degrees
    pub rotation: f32,
    pub blur: f32,
    /// Typewriter bound; `None` shows every character.
    pub visible_chars: Option<usize>,
}

impl Default for AnimationState {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
            rotation: 0.0,
            blur: 0.0,
            visible_chars: None,
        }
    }
}

impl AnimationState {
    /// Combine two states: opacity and scale multiply, offsets and rotation
    /// add, blur takes the max. Two character bounds keep the smaller one;
    /// an unbounded side defers to the other.
    pub fn merge(self, other: AnimationState) -> AnimationState {
        let visible_chars = match (self.visible_chars, other.visible_chars) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, None) => a,
            (None, b) => b,
        };
        AnimationState {
            opacity: self.opacity * other.opacity,
            scale: self.scale * other.scale,
            offset_x: self.offset_x + other.offset_x,
            offset_y: self.offset_y + other.offset_y,
            rotation: self.rotation + other.rotation,
            blur: self.blur.max(other.blur),
            visible_chars,
        }
    }
}

/// Easing curves mapping linear progress in [0,1] onto eased progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Easing {
    Linear,
    InQuad,
    OutQuad,
    InOutQuad,
    OutCubic,
    OutBack,
    OutElastic,
}

impl Easing {
    pub fn apply(self, t: f32) -> f32 {
        match self {
            Easing::Linear => t,
            Easing::InQuad => t * t,
            Easing::OutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
            Easing::OutCubic => 1.0 - (1.0 - t).powi(3),
            Easing::OutBack => {
                const C1: f32 = 1.70158;
                const C3: f32 = C1 + 1.0;
                1.0 + C3 * (t - 1.0).powi(3) + C1 * (t - 1.0).powi(2)
            }
            Easing::OutElastic => {
                if t == 0.0 || t == 1.0 {
                    return t;
                }
                2f32.powf(-10.0 * t)
                    * ((t * 10.0 - 0.75) * (2.0 * std::f32::consts::PI) / 3.0).sin()
                    + 1.0
            }
        }
    }
}

/// The single property a tween drives.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Property {
    Opacity { from: f32, to: f32 },
    Scale { from: f32, to: f32 },
    OffsetX { from: f32, to: f32 },
    OffsetY { from: f32, to: f32 },
    /// Reveal `total` characters one at a time.
    VisibleChars { total: usize },
}

impl Property {
    fn at(self, progress: f32) -> AnimationState {
        let lerp = |from: f32, to: f32| from + (to - from) * progress;
        let neutral = AnimationState::default();
        match self {
            Property::Opacity { from, to } => AnimationState {
                opacity: lerp(from, to),
                ..neutral
            },
            Property::Scale { from, to } => AnimationState {
                scale: lerp(from, to),
                ..neutral
            },
            Property::OffsetX { from, to } => AnimationState {
                offset_x: lerp(from, to),
                ..neutral
            },
            Property::OffsetY { from, to } => AnimationState {
                offset_y: lerp(from, to),
                ..neutral
            },
            Property::VisibleChars { total } => AnimationState {
                visible_chars: Some((total as f32 * progress) as usize),
                ..neutral
            },
        }
    }

    fn start(self) -> AnimationState {
        self.at(0.0)
    }

    fn end(self) -> AnimationState {
        match self {
            Property::VisibleChars { total } => AnimationState {
                visible_chars: Some(total),
                ..AnimationState::default()
            },
            _ => self.at(1.0),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Animation {
    /// Interpolates one property over `duration` seconds after `delay`.
    Tween {
        property: Property,
        duration: f32,
        delay: f32,
        easing: Easing,
    },
    /// Children run at the same time; their states merge.
    Parallel(Vec<Animation>),
    /// Children run one after another.
    Sequential(Vec<Animation>),
    /// Neutral state for a fixed span, used as a gap inside `Sequential`.
    Hold(f32),
    /// Neutral state forever.
    Static,
}

impl Animation {
    pub fn fade_in(duration: f32, delay: f32, easing: Easing) -> Self {
        Animation::Tween {
            property: Property::Opacity { from: 0.0, to: 1.0 },
            duration,
            delay,
            easing,
        }
    }

    pub fn fade_out(duration: f32, delay: f32, easing: Easing) -> Self {
        Animation::Tween {
            property: Property::Opacity { from: 1.0, to: 0.0 },
            duration,
            delay,
            easing,
        }
    }

    pub fn scale(from: f32, to: f32, duration: f32, delay: f32, easing: Easing) -> Self {
        Animation::Tween {
            property: Property::Scale { from, to },
            duration,
            delay,
            easing,
        }
    }

    /// Slide into place from `distance` pixels below (negative: above).
    pub fn slide(distance: f32, duration: f32, delay: f32, easing: Easing) -> Self {
        Animation::Tween {
            property: Property::OffsetY {
                from: distance,
                to: 0.0,
            },
            duration,
            delay,
            easing,
        }
    }

    pub fn typewriter(total_chars: usize, duration: f32, delay: f32) -> Self {
        Animation::Tween {
            property: Property::VisibleChars { total: total_chars },
            duration,
            delay,
            easing: Easing::Linear,
        }
    }

    /// Total span in seconds, delays included.
    pub fn duration(&self) -> f32 {
        match self {
            Animation::Tween {
                duration, delay, ..
            } => delay + duration,
            Animation::Parallel(children) => children
                .iter()
                .map(Animation::duration)
                .fold(0.0, f32::max),
            Animation::Sequential(children) => children.iter().map(Animation::duration).sum(),
            Animation::Hold(span) => *span,
            Animation::Static => 0.0,
        }
    }

    pub fn start_state(&self) -> AnimationState {
        match self {
            Animation::Tween { property, .. } => property.start(),
            Animation::Parallel(children) => children
                .iter()
                .fold(AnimationState::default(), |acc, c| acc.merge(c.start_state())),
            Animation::Sequential(children) => children
                .first()
                .map_or_else(AnimationState::default, Animation::start_state),
            Animation::Hold(_) | Animation::Static => AnimationState::default(),
        }
    }

    pub fn end_state(&self) -> AnimationState {
        match self {
            Animation::Tween { property, .. } => property.end(),
            Animation::Parallel(children) => children
                .iter()
                .fold(AnimationState::default(), |acc, c| acc.merge(c.end_state())),
            Animation::Sequential(children) => children
                .last()
                .map_or_else(AnimationState::default, Animation::end_state),
            Animation::Hold(_) | Animation::Static => AnimationState::default(),
        }
    }

    /// State at `time` seconds after the animation starts.
    pub fn evaluate(&self, time: f32) -> AnimationState {
        match self {
            Animation::Tween {
                property,
                duration,
                delay,
                easing,
            } => {
                if time >= delay + duration {
                    property.end()
                } else if time <= *delay {
                    property.start()
                } else {
                    property.at(easing.apply((time - delay) / duration))
                }
            }
            Animation::Parallel(children) => children
                .iter()
                .fold(AnimationState::default(), |acc, c| acc.merge(c.evaluate(time))),
            Animation::Sequential(children) => {
                let mut offset = 0.0;
                for child in children {
                    let span = child.duration();
                    if time < offset + span {
                        return child.evaluate(time - offset);
                    }
                    offset += span;
                }
                self.end_state()
            }
            Animation::Hold(_) | Animation::Static => AnimationState::default(),
        }
    }

    /// Index of the `Sequential` child active at `time`, `None` once the
    /// sequence has finished or for any other variant.
    pub fn active_child(&self, time: f32) -> Option<usize> {
        let Animation::Sequential(children) = self else {
            return None;
        };
        let mut offset = 0.0;
        for (i, child) in children.iter().enumerate() {
            let span = child.duration();
            if time < offset + span {
                return Some(i);
            }
            offset += span;
        }
        None
    }
}

/// Title and subtitle animations for the intro clip.
#[derive(Clone, Debug)]
pub struct IntroAnimations {
    pub title: Animation,
    pub subtitle: Animation,
}

impl IntroAnimations {
    /// Title fades in while scaling down from 115%; the subtitle fades in
    /// after the title settles.
    pub fn standard(title_duration: f32, subtitle_delay: f32, subtitle_duration: f32) -> Self {
        Self {
            title: Animation::Parallel(vec![
                Animation::fade_in(title_duration, 0.0, Easing::OutQuad),
                Animation::scale(1.15, 1.0, title_duration, 0.0, Easing::OutCubic),
            ]),
            subtitle: Animation::fade_in(
                subtitle_duration,
                title_duration + subtitle_delay,
                Easing::OutQuad,
            ),
        }
    }
}

/// Fade in while settling from 90% scale with an elastic overshoot.
pub fn avatar_pulse(duration: f32) -> Animation {
    Animation::Parallel(vec![
        Animation::fade_in(0.5, 0.0, Easing::OutQuad),
        Animation::scale(0.9, 1.0, duration, 0.0, Easing::OutElastic),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_EASINGS: [Easing; 7] = [
        Easing::Linear,
        Easing::InQuad,
        Easing::OutQuad,
        Easing::InOutQuad,
        Easing::OutCubic,
        Easing::OutBack,
        Easing::OutElastic,
    ];

    fn builtins() -> Vec<Animation> {
        vec![
            Animation::fade_in(0.5, 0.0, Easing::OutQuad),
            Animation::fade_out(0.5, 0.2, Easing::InQuad),
            Animation::scale(1.1, 1.0, 0.5, 0.0, Easing::OutQuad),
            Animation::scale(0.8, 1.0, 0.5, 0.0, Easing::OutBack),
            Animation::slide(50.0, 0.5, 0.0, Easing::OutCubic),
            Animation::slide(-50.0, 0.5, 0.1, Easing::OutCubic),
            Animation::typewriter(12, 1.0, 0.0),
            Animation::Hold(1.0),
            Animation::Static,
            avatar_pulse(2.0),
            IntroAnimations::standard(1.0, 0.3, 0.5).title,
        ]
    }

    #[test]
    fn easing_endpoints() {
        for easing in ALL_EASINGS {
            assert!(easing.apply(0.0).abs() < 1e-6, "{:?}", easing);
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-6, "{:?}", easing);
        }
    }

    #[test]
    fn easing_closed_forms() {
        assert_eq!(Easing::InQuad.apply(0.5), 0.25);
        assert_eq!(Easing::OutQuad.apply(0.5), 0.75);
        assert_eq!(Easing::InOutQuad.apply(0.25), 0.125);
        assert_eq!(Easing::InOutQuad.apply(0.75), 0.875);
        assert_eq!(Easing::OutCubic.apply(0.5), 0.875);
        // out_back overshoots past 1.0 before settling
        assert!(Easing::OutBack.apply(0.7) > 1.0);
        // out_elastic oscillates around 1.0
        let samples: Vec<f32> = (1..20).map(|i| Easing::OutElastic.apply(i as f32 / 20.0)).collect();
        assert!(samples.iter().any(|&v| v > 1.0));
    }

    #[test]
    fn start_and_end_states_are_exact() {
        for anim in builtins() {
            assert_eq!(anim.evaluate(0.0), anim.start_state(), "{:?}", anim);
            assert_eq!(anim.evaluate(anim.duration()), anim.end_state(), "{:?}", anim);
            assert_eq!(anim.evaluate(anim.duration() + 5.0), anim.end_state(), "{:?}", anim);
        }
    }

    #[test]
    fn evaluation_is_repeatable() {
        for anim in builtins() {
            for t in [0.05f32, 0.33, 0.71, 1.4] {
                assert_eq!(anim.evaluate(t), anim.evaluate(t));
            }
        }
    }

    #[test]
    fn tween_holds_start_during_delay() {
        let anim = Animation::fade_in(1.0, 0.5, Easing::Linear);
        assert_eq!(anim.evaluate(0.25).opacity, 0.0);
        assert!((anim.evaluate(1.0).opacity - 0.5).abs() < 1e-6);
        assert_eq!(anim.duration(), 1.5);
    }

    #[test]
    fn tween_leaves_other_properties_neutral() {
        let state = Animation::scale(2.0, 1.0, 1.0, 0.0, Easing::Linear).evaluate(0.5);
        assert!((state.scale - 1.5).abs() < 1e-6);
        assert_eq!(state.opacity, 1.0);
        assert_eq!(state.offset_x, 0.0);
        assert_eq!(state.offset_y, 0.0);
        assert_eq!(state.visible_chars, None);
    }

    #[test]
    fn merge_rules() {
        let a = AnimationState {
            opacity: 0.5,
            scale: 2.0,
            offset_x: 3.0,
            offset_y: -1.0,
            rotation: 10.0,
            blur: 1.0,
            visible_chars: Some(4),
        };
        let b = AnimationState {
            opacity: 0.5,
            scale: 0.5,
            offset_x: 1.0,
            offset_y: 1.0,
            rotation: 5.0,
            blur: 3.0,
            visible_chars: Some(2),
        };
        let m = a.merge(b);
        assert_eq!(m.opacity, 0.25);
        assert_eq!(m.scale, 1.0);
        assert_eq!(m.offset_x, 4.0);
        assert_eq!(m.offset_y, 0.0);
        assert_eq!(m.rotation, 15.0);
        assert_eq!(m.blur, 3.0);
        assert_eq!(m.visible_chars, Some(2));

        let unbounded = AnimationState::default();
        assert_eq!(a.merge(unbounded).visible_chars, Some(4));
        assert_eq!(unbounded.merge(unbounded).visible_chars, None);
    }

    #[test]
    fn parallel_duration_is_max() {
        let anim = Animation::Parallel(vec![
            Animation::fade_in(1.0, 0.0, Easing::Linear),
            Animation::scale(1.2, 1.0, 0.5, 1.0, Easing::Linear),
            Animation::Hold(0.3),
        ]);
        assert_eq!(anim.duration(), 1.5);
    }

    #[test]
    fn parallel_merges_children() {
        let anim = Animation::Parallel(vec![
            Animation::fade_in(1.0, 0.0, Easing::Linear),
            Animation::scale(2.0, 1.0, 1.0, 0.0, Easing::Linear),
        ]);
        let state = anim.evaluate(0.5);
        assert!((state.opacity - 0.5).abs() < 1e-6);
        assert!((state.scale - 1.5).abs() < 1e-6);
    }

    #[test]
    fn sequential_duration_is_sum_and_dispatches_once() {
        let anim = Animation::Sequential(vec![
            Animation::fade_in(1.0, 0.0, Easing::Linear),
            Animation::Hold(0.5),
            Animation::fade_out(1.0, 0.0, Easing::Linear),
        ]);
        assert_eq!(anim.duration(), 2.5);

        assert_eq!(anim.active_child(0.0), Some(0));
        assert_eq!(anim.active_child(0.99), Some(0));
        assert_eq!(anim.active_child(1.0), Some(1));
        assert_eq!(anim.active_child(1.6), Some(2));
        assert_eq!(anim.active_child(2.5), None);

        // second fade runs on its own clock
        assert!((anim.evaluate(2.0).opacity - 0.5).abs() < 1e-6);
        assert_eq!(anim.evaluate(1.2), AnimationState::default());
        // past the end: last child's end state
        assert_eq!(anim.evaluate(10.0).opacity, 0.0);
    }

    #[test]
    fn typewriter_reveals_progressively() {
        let anim = Animation::typewriter(10, 1.0, 0.0);
        assert_eq!(anim.evaluate(0.0).visible_chars, Some(0));
        assert_eq!(anim.evaluate(0.55).visible_chars, Some(5));
        assert_eq!(anim.evaluate(1.0).visible_chars, Some(10));
    }

    #[test]
    fn intro_preset_settles_to_neutral() {
        let intro = IntroAnimations::standard(1.0, 0.3, 0.5);
        assert_eq!(intro.title.end_state(), AnimationState::default());
        assert!((intro.subtitle.duration() - 1.8).abs() < 1e-6);
        assert_eq!(intro.subtitle.evaluate(1.0).opacity, 0.0);
        let start = intro.title.start_state();
        assert_eq!(start.opacity, 0.0);
        assert!((start.scale - 1.15).abs() < 1e-6);
    }
}
