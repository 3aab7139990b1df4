//! Audio mix planning for the ffmpeg `filter_complex` stage.
//!
//! Every optional source is positioned on the absolute output timeline with
//! its own trim window, fade envelope and delay, then folded into a mix bus
//! pairwise. Nothing here touches samples; the result is a [`MixPlan`] the
//! encoder turns into command-line arguments.

use std::fmt;

/// Seconds of intro sound kept after its solo part, faded out under the main track.
pub const INTRO_SOUND_TAIL: f64 = 10.0;
pub const INTRO_SOUND_FADE_IN: f64 = 0.5;
pub const INTRO_SOUND_GAIN: f64 = 0.3;
/// Main track boost applied when an intro sound is mixed underneath.
pub const MAIN_BOOST_WITH_INTRO: f64 = 2.5;
pub const MAIN_FADE_IN: f64 = 2.0;
pub const MAIN_FADE_IN_AFTER_INTRO: f64 = 3.0;
/// The outro enters this many seconds before the main content ends.
pub const OUTRO_LEAD: f64 = 5.0;
pub const OUTRO_TAIL: f64 = 2.0;
pub const OUTRO_FADE: f64 = 3.0;
pub const OUTRO_GAIN: f64 = 0.35;
pub const MUSIC_FADE: f64 = 3.0;
/// Background music runs this long past the main track when no outro cuts it.
pub const MUSIC_TAIL: f64 = 5.0;

const LOUDNESS_PEAK: f64 = 0.9;
const LOUDNESS_SMOOTHING: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AudioSource {
    Main,
    IntroSound,
    OutroSound,
    BackgroundMusic,
}

impl AudioSource {
    /// Pad label of the source's processed stream inside the graph.
    pub fn label(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::IntroSound => "intro",
            Self::OutroSound => "outro",
            Self::BackgroundMusic => "bgm",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MixDuration {
    Longest,
    First,
}

/// One ffmpeg audio filter.
#[derive(Clone, Debug, PartialEq)]
pub enum AudioOp {
    Loudness { peak: f64, smoothing: u32 },
    Gain(f64),
    Trim { start: f64, end: f64 },
    FadeIn { start: f64, duration: f64 },
    FadeOut { start: f64, duration: f64 },
    Delay { ms: u64 },
    Mix { inputs: usize, duration: MixDuration },
    Compress,
}

impl fmt::Display for AudioOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loudness { peak, smoothing } => write!(f, "dynaudnorm=p={}:s={}", peak, smoothing),
            Self::Gain(gain) => write!(f, "volume={}", gain),
            Self::Trim { start, end } => write!(f, "atrim={}:{}", start, end),
            Self::FadeIn { start, duration } => write!(f, "afade=t=in:st={}:d={}", start, duration),
            Self::FadeOut { start, duration } => {
                write!(f, "afade=t=out:st={}:d={}", start, duration)
            }
            Self::Delay { ms } => write!(f, "adelay={}|{}", ms, ms),
            Self::Mix { inputs, duration } => {
                let duration = match duration {
                    MixDuration::Longest => "longest",
                    MixDuration::First => "first",
                };
                let weights = vec!["1"; *inputs].join(" ");
                // normalize=0: levels come only from each source's own gain
                write!(
                    f,
                    "amix=inputs={}:duration={}:weights={}:normalize=0",
                    inputs, duration, weights
                )
            }
            Self::Compress => write!(f, "acompressor=threshold=-20dB:ratio=4:attack=5:release=50"),
        }
    }
}

/// A chain of filters from one or more labelled pads to one output pad.
#[derive(Clone, Debug, PartialEq)]
pub struct Stage {
    pub inputs: Vec<String>,
    pub ops: Vec<AudioOp>,
    pub output: String,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for input in &self.inputs {
            write!(f, "[{}]", input)?;
        }
        let ops: Vec<String> = self.ops.iter().map(ToString::to_string).collect();
        write!(f, "{}[{}]", ops.join(","), self.output)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterGraph {
    pub stages: Vec<Stage>,
}

impl FilterGraph {
    pub const OUTPUT: &'static str = "aout";
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{}", stage)?;
        }
        Ok(())
    }
}

/// Durations and presence flags the mix is computed from. Durations are in
/// seconds, volumes are linear factors (1.0 = unchanged).
#[derive(Clone, Debug, PartialEq)]
pub struct MixConfig {
    /// `None` when no intro title clip precedes the main body.
    pub intro_clip: Option<f64>,
    /// Solo length of the intro sound, `None` when there is no intro sound.
    pub intro_sound: Option<f64>,
    pub outro_sound: bool,
    pub background_music: bool,
    pub main_duration: f64,
    /// Zero when no end screen is appended.
    pub end_screen: f64,
    pub volume: f64,
    pub music_volume: f64,
}

/// Where and how one source lands on the output timeline.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceTiming {
    pub source: AudioSource,
    pub input: usize,
    pub looped: bool,
    pub gain: f64,
    pub delay_ms: u64,
    pub trim: Option<(f64, f64)>,
    pub fade_in: Option<(f64, f64)>,
    pub fade_out: Option<(f64, f64)>,
    pub normalize_loudness: bool,
}

impl SourceTiming {
    fn ops(&self) -> Vec<AudioOp> {
        let mut ops = Vec::new();
        if self.normalize_loudness {
            ops.push(AudioOp::Loudness {
                peak: LOUDNESS_PEAK,
                smoothing: LOUDNESS_SMOOTHING,
            });
        }
        ops.push(AudioOp::Gain(self.gain));
        if let Some((start, end)) = self.trim {
            ops.push(AudioOp::Trim { start, end });
        }
        if let Some((start, duration)) = self.fade_in {
            ops.push(AudioOp::FadeIn { start, duration });
        }
        if let Some((start, duration)) = self.fade_out {
            ops.push(AudioOp::FadeOut { start, duration });
        }
        if self.delay_ms > 0 {
            ops.push(AudioOp::Delay { ms: self.delay_ms });
        }
        ops
    }

    fn stage(&self) -> Stage {
        Stage {
            inputs: vec![format!("{}:a", self.input)],
            ops: self.ops(),
            output: self.source.label().to_string(),
        }
    }
}

/// Audio side of the encoder invocation.
#[derive(Clone, Debug, PartialEq)]
pub enum AudioFilter {
    Graph(FilterGraph),
    /// No mixing needed, only a level change on the main track.
    Volume(f64),
    Passthrough,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MixPlan {
    pub sources: Vec<SourceTiming>,
    pub filter: AudioFilter,
}

impl MixPlan {
    pub fn source(&self, source: AudioSource) -> Option<&SourceTiming> {
        self.sources.iter().find(|s| s.source == source)
    }

    /// Extra inputs after the main track, in input-index order.
    pub fn extra_inputs(&self) -> impl Iterator<Item = &SourceTiming> {
        self.sources.iter().filter(|s| s.source != AudioSource::Main)
    }
}

pub struct AudioMixGraphBuilder {
    config: MixConfig,
}

fn pairwise_mix(first: &str, second: &str, output: &str) -> Stage {
    Stage {
        inputs: vec![first.to_string(), second.to_string()],
        ops: vec![AudioOp::Mix {
            inputs: 2,
            duration: MixDuration::Longest,
        }],
        output: output.to_string(),
    }
}

fn to_ms(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0).round() as u64
}

impl AudioMixGraphBuilder {
    pub fn new(config: MixConfig) -> Self {
        Self { config }
    }

    fn intro_clip(&self) -> f64 {
        self.config.intro_clip.unwrap_or(0.0).max(0.0)
    }

    fn intro_sound(&self) -> Option<f64> {
        self.config.intro_sound.map(|d| d.max(0.0))
    }

    /// Main track offset: intro clip plus the intro sound's solo part.
    pub fn main_delay_ms(&self) -> u64 {
        to_ms(self.intro_clip() + self.intro_sound().unwrap_or(0.0))
    }

    fn main_start(&self) -> f64 {
        self.main_delay_ms() as f64 / 1000.0
    }

    /// Absolute start of the outro sound in seconds, clamped at zero.
    pub fn outro_start(&self) -> f64 {
        (self.main_start() + self.config.main_duration - self.config.end_screen - OUTRO_LEAD)
            .max(0.0)
    }

    /// Length of the mixed output: main track after its delay, plus the end screen.
    pub fn total_duration(&self) -> f64 {
        self.main_start() + self.config.main_duration.max(0.0) + self.config.end_screen.max(0.0)
    }

    /// Absolute end of the output: main track, end screen, then the tail.
    fn outro_end(&self) -> f64 {
        self.total_duration() + OUTRO_TAIL
    }

    /// True when a `filter_complex` graph is required rather than a plain
    /// volume filter.
    pub fn needs_graph(&self) -> bool {
        self.config.intro_clip.is_some()
            || self.config.intro_sound.is_some()
            || self.config.outro_sound
            || self.config.background_music
    }

    /// Per-source timing with inputs numbered from `main_input`; optional
    /// sources follow in intro, outro, music order.
    pub fn sources(&self, main_input: usize) -> Vec<SourceTiming> {
        let cfg = &self.config;
        let mut next_input = main_input + 1;
        let mut take_input = || {
            let idx = next_input;
            next_input += 1;
            idx
        };

        let intro_sound = self.intro_sound();
        let main_delay_ms = self.main_delay_ms();
        let mut sources = vec![SourceTiming {
            source: AudioSource::Main,
            input: main_input,
            looped: false,
            gain: if intro_sound.is_some() {
                cfg.volume * MAIN_BOOST_WITH_INTRO
            } else {
                cfg.volume
            },
            delay_ms: main_delay_ms,
            trim: None,
            fade_in: Some((
                0.0,
                if intro_sound.is_some() {
                    MAIN_FADE_IN_AFTER_INTRO
                } else {
                    MAIN_FADE_IN
                },
            )),
            fade_out: None,
            normalize_loudness: false,
        }];

        if let Some(solo) = intro_sound {
            sources.push(SourceTiming {
                source: AudioSource::IntroSound,
                input: take_input(),
                looped: false,
                gain: INTRO_SOUND_GAIN,
                delay_ms: to_ms(self.intro_clip()),
                trim: Some((0.0, solo + INTRO_SOUND_TAIL)),
                fade_in: Some((0.0, INTRO_SOUND_FADE_IN)),
                fade_out: Some((solo, INTRO_SOUND_TAIL)),
                normalize_loudness: true,
            });
        }

        if cfg.outro_sound {
            let window = (self.outro_end() - self.outro_start()).max(0.0);
            sources.push(SourceTiming {
                source: AudioSource::OutroSound,
                input: take_input(),
                looped: false,
                gain: OUTRO_GAIN,
                delay_ms: to_ms(self.outro_start()),
                trim: Some((0.0, window)),
                fade_in: Some((0.0, OUTRO_FADE)),
                fade_out: Some(((window - OUTRO_FADE).max(0.0), OUTRO_FADE)),
                normalize_loudness: true,
            });
        }

        if cfg.background_music {
            let start = self.main_start();
            let window = if cfg.outro_sound {
                (self.outro_start() - start).max(0.0)
            } else {
                cfg.main_duration.max(0.0) + MUSIC_TAIL
            };
            sources.push(SourceTiming {
                source: AudioSource::BackgroundMusic,
                input: take_input(),
                looped: true,
                gain: cfg.music_volume,
                delay_ms: main_delay_ms,
                trim: Some((0.0, window)),
                fade_in: Some((0.0, MUSIC_FADE)),
                fade_out: Some(((window - MUSIC_FADE).max(0.0), MUSIC_FADE)),
                normalize_loudness: false,
            });
        }

        sources
    }

    pub fn build(&self, main_input: usize) -> MixPlan {
        let sources = self.sources(main_input);

        if !self.needs_graph() {
            let filter = if (self.config.volume - 1.0).abs() > f64::EPSILON {
                AudioFilter::Volume(self.config.volume)
            } else {
                AudioFilter::Passthrough
            };
            return MixPlan { sources, filter };
        }

        for s in &sources {
            log::info!(
                "Audio {}: input {}, delay {}ms, window {:?}, gain {}",
                s.source.label(),
                s.input,
                s.delay_ms,
                s.trim,
                s.gain
            );
        }

        let mut stages: Vec<Stage> = sources.iter().map(SourceTiming::stage).collect();
        let mut bus = AudioSource::Main.label().to_string();

        if self.config.intro_sound.is_some() {
            stages.push(pairwise_mix(AudioSource::IntroSound.label(), &bus, "with_intro"));
            bus = "with_intro".to_string();
        }
        if self.config.outro_sound {
            stages.push(pairwise_mix(&bus, AudioSource::OutroSound.label(), "premix"));
            bus = "premix".to_string();
        }

        let final_stage = if self.config.background_music {
            Stage {
                inputs: vec![bus, AudioSource::BackgroundMusic.label().to_string()],
                ops: vec![
                    AudioOp::Mix {
                        inputs: 2,
                        duration: MixDuration::First,
                    },
                    AudioOp::Compress,
                ],
                output: FilterGraph::OUTPUT.to_string(),
            }
        } else {
            Stage {
                inputs: vec![bus],
                ops: vec![AudioOp::Compress],
                output: FilterGraph::OUTPUT.to_string(),
            }
        };
        stages.push(final_stage);

        MixPlan {
            sources,
            filter: AudioFilter::Graph(FilterGraph { stages }),
        }
    }
}
