use clap::Parser;
use std::path::PathBuf;

use wavereel::config::{default_system_fonts, defaults, Config, EndScreen, IntroSettings, RenderSettings};
use wavereel::error::RenderError;
use wavereel::render::background::BackgroundSpec;
use wavereel::render::canvas::parse_hex;

#[derive(Parser, Debug)]
#[command(name = "wavereel", about = "Audio visualizer video generator")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG, AAC)
    pub input: Option<PathBuf>,

    /// Output file (video, or audio with --audio-only)
    #[arg(short, long, default_value = "output.mp4")]
    pub output: PathBuf,

    /// Config file (defaults to ./wavereel.toml or the user config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Visualizer style
    #[arg(short, long, default_value = defaults::STYLE)]
    pub style: String,

    /// Visualizer colour (#rrggbb)
    #[arg(long, default_value = defaults::WAVE_COLOR)]
    pub color: String,

    /// Background type: color, gradient, image or random (picks from --bg dir or ./backgrounds)
    #[arg(long, default_value = defaults::BACKGROUND_TYPE)]
    pub bg_type: String,

    /// Background value: colour, "#top,#bottom", image path or image directory
    #[arg(long, default_value = defaults::BACKGROUND)]
    pub bg: String,

    /// Video width in pixels
    #[arg(long, default_value_t = defaults::WIDTH)]
    pub width: u32,

    /// Video height in pixels
    #[arg(long, default_value_t = defaults::HEIGHT)]
    pub height: u32,

    /// Frames per second
    #[arg(long, default_value_t = defaults::FPS)]
    pub fps: u32,

    /// Avatar image drawn at the centre of the frame
    #[arg(long)]
    pub avatar: Option<PathBuf>,

    /// Avatar diameter in pixels (default: a quarter of the shorter side)
    #[arg(long)]
    pub avatar_size: Option<u32>,

    /// Subtitle JSON file: [{"text", "start_ms", "end_ms"}]
    #[arg(long)]
    pub subtitles: Option<PathBuf>,

    #[arg(long)]
    pub subtitle_font_size: Option<f32>,

    #[arg(long, default_value = defaults::SUBTITLE_COLOR)]
    pub subtitle_color: String,

    /// Font file path or http(s) URL for titles and subtitles
    #[arg(long)]
    pub font: Option<String>,

    /// Main track volume in percent
    #[arg(long, default_value_t = defaults::VOLUME)]
    pub volume: u32,

    /// Sound played before the main track
    #[arg(long)]
    pub intro_sound: Option<PathBuf>,

    /// Seconds the intro sound plays before the main track starts
    #[arg(long, default_value_t = defaults::INTRO_SOUND_DURATION)]
    pub intro_sound_duration: f64,

    /// Sound faded in over the last seconds and the end screen
    #[arg(long)]
    pub outro_sound: Option<PathBuf>,

    /// Background music, looped under the main track
    #[arg(long)]
    pub music: Option<PathBuf>,

    /// Background music volume in percent
    #[arg(long, default_value_t = defaults::MUSIC_VOLUME)]
    pub music_volume: u32,

    /// Title shown on an intro clip before the visualizer starts
    #[arg(long)]
    pub intro_title: Option<String>,

    #[arg(long)]
    pub intro_subtitle: Option<String>,

    /// Draw the intro without animation
    #[arg(long)]
    pub intro_static: bool,

    #[arg(long)]
    pub intro_avatar: Option<PathBuf>,

    /// Intro background image or video (defaults to the main background)
    #[arg(long)]
    pub intro_bg: Option<PathBuf>,

    #[arg(long, default_value = defaults::TITLE_COLOR)]
    pub intro_title_color: String,

    /// Intro clip length in seconds
    #[arg(long, default_value_t = defaults::INTRO_CLIP_DURATION)]
    pub intro_duration: f64,

    /// Save a thumbnail image and embed it as cover art
    #[arg(long)]
    pub thumbnail: Option<PathBuf>,

    /// End screen clip, or a directory holding end_screen_{W}x{H}.mp4
    #[arg(long)]
    pub end_screen: Option<PathBuf>,

    #[arg(long, default_value_t = defaults::END_SCREEN_DURATION)]
    pub end_screen_duration: f64,

    /// x264 preset
    #[arg(long, default_value = defaults::PRESET)]
    pub preset: String,

    /// H.264 CRF quality (0-51, lower = better). Ignored when --bitrate is set.
    #[arg(long, default_value_t = defaults::CRF)]
    pub crf: u32,

    /// Video bitrate (e.g. 2400k, 5M). When set, uses -b:v instead of -crf.
    #[arg(short, long)]
    pub bitrate: Option<String>,

    /// Encoder threads (0 = auto)
    #[arg(long, default_value_t = defaults::THREADS)]
    pub threads: usize,

    /// Visualizer offset in seconds (positive = behind the audio)
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub wave_sync: f64,

    /// Number of frequency bands
    #[arg(long, default_value_t = defaults::BANDS)]
    pub bands: usize,

    /// Seed for randomised styles
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Only mix the audio tracks
    #[arg(long)]
    pub audio_only: bool,

    /// List available visualizer styles and exit
    #[arg(long)]
    pub list_styles: bool,

    /// Font search list from the config file.
    #[arg(skip)]
    pub system_fonts: Option<Vec<PathBuf>>,
}

impl Cli {
    /// Apply config file values wherever the flag is still at its default.
    pub fn merge(&mut self, cfg: Config) {
        if self.width == defaults::WIDTH { self.width = cfg.output.width; }
        if self.height == defaults::HEIGHT { self.height = cfg.output.height; }
        if self.fps == defaults::FPS { self.fps = cfg.output.fps; }
        if self.crf == defaults::CRF { self.crf = cfg.output.crf; }
        if self.preset == defaults::PRESET { self.preset = cfg.output.preset; }
        if self.threads == defaults::THREADS { self.threads = cfg.output.threads; }
        if self.style == defaults::STYLE { self.style = cfg.visual.style; }
        if self.color == defaults::WAVE_COLOR { self.color = cfg.visual.color; }
        if self.bg_type == defaults::BACKGROUND_TYPE { self.bg_type = cfg.visual.background_type; }
        if self.bg == defaults::BACKGROUND { self.bg = cfg.visual.background; }
        if self.volume == defaults::VOLUME { self.volume = cfg.audio.volume; }
        if self.music_volume == defaults::MUSIC_VOLUME { self.music_volume = cfg.audio.music_volume; }
        if self.bands == defaults::BANDS { self.bands = cfg.audio.bands; }
        if self.intro_duration == defaults::INTRO_CLIP_DURATION { self.intro_duration = cfg.intro.duration; }
        if self.intro_title_color == defaults::TITLE_COLOR { self.intro_title_color = cfg.intro.title_color; }
        if self.subtitle_color == defaults::SUBTITLE_COLOR { self.subtitle_color = cfg.subtitle.color; }
        if self.subtitle_font_size.is_none() {
            self.subtitle_font_size = cfg.subtitle.font_size;
        }
        if self.font.is_none() {
            self.font = cfg.font.path;
        }
        if self.end_screen.is_none() {
            self.end_screen = cfg.end_screen.path;
        }
        if self.end_screen_duration == defaults::END_SCREEN_DURATION {
            self.end_screen_duration = cfg.end_screen.duration;
        }
        if !cfg.font.system.is_empty() {
            self.system_fonts = Some(cfg.font.system);
        }
    }

    pub fn into_settings(self, input: PathBuf) -> Result<RenderSettings, RenderError> {
        let intro = match self.intro_title {
            Some(title) => Some(IntroSettings {
                title,
                subtitle: self.intro_subtitle,
                duration: self.intro_duration,
                animated: !self.intro_static,
                avatar: self.intro_avatar,
                background: self.intro_bg,
                title_color: parse_hex(&self.intro_title_color)?,
            }),
            None => None,
        };
        let end_screen = self
            .end_screen
            .as_deref()
            .and_then(|path| EndScreen::resolve(path, self.width, self.height, self.end_screen_duration));

        Ok(RenderSettings {
            input,
            output: self.output,
            width: self.width,
            height: self.height,
            fps: self.fps,
            style: self.style,
            wave_color: parse_hex(&self.color)?,
            background: BackgroundSpec::parse(&self.bg_type, &self.bg)?,
            avatar: self.avatar,
            avatar_size: self.avatar_size,
            bands: self.bands,
            seed: self.seed,
            wave_sync: self.wave_sync,
            subtitles: self.subtitles,
            subtitle_font_size: self.subtitle_font_size,
            subtitle_color: parse_hex(&self.subtitle_color)?,
            font: self.font,
            system_fonts: self.system_fonts.unwrap_or_else(default_system_fonts),
            volume: self.volume as f64 / 100.0,
            music_volume: self.music_volume as f64 / 100.0,
            intro_sound: self.intro_sound,
            intro_sound_duration: self.intro_sound_duration,
            outro_sound: self.outro_sound,
            music: self.music,
            intro,
            end_screen,
            thumbnail: self.thumbnail,
            preset: self.preset,
            crf: self.crf,
            bitrate: self.bitrate,
            threads: self.threads,
        })
    }
}
