use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::encode::ffmpeg::EncoderSettings;
use crate::render::background::BackgroundSpec;
use crate::render::canvas::Color;
use crate::render::text::SYSTEM_FONTS;
use crate::error::RenderError;

/// Values shared by the CLI defaults and the config file defaults, so a
/// config value is only applied where the flag was left alone.
pub mod defaults {
    pub const WIDTH: u32 = 1920;
    pub const HEIGHT: u32 = 1080;
    pub const FPS: u32 = 30;
    pub const PRESET: &str = "ultrafast";
    pub const CRF: u32 = 23;
    pub const THREADS: usize = 0;
    pub const STYLE: &str = "waveform";
    pub const WAVE_COLOR: &str = "#00ff88";
    pub const BACKGROUND_TYPE: &str = "color";
    pub const BACKGROUND: &str = "#1a1a2e";
    pub const VOLUME: u32 = 100;
    pub const MUSIC_VOLUME: u32 = 15;
    pub const INTRO_SOUND_DURATION: f64 = 3.0;
    pub const INTRO_CLIP_DURATION: f64 = 3.0;
    pub const TITLE_COLOR: &str = "#ffffff";
    pub const SUBTITLE_COLOR: &str = "#ffffff";
    pub const END_SCREEN_DURATION: f64 = 5.0;
    pub const BANDS: usize = crate::audio::analysis::DEFAULT_BANDS;
}

/// Contents of `wavereel.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub visual: VisualConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub intro: IntroConfig,
    #[serde(default)]
    pub subtitle: SubtitleConfig,
    #[serde(default)]
    pub font: FontConfig,
    #[serde(default)]
    pub end_screen: EndScreenConfig,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_preset")]
    pub preset: String,
    #[serde(default = "default_crf")]
    pub crf: u32,
    #[serde(default)]
    pub threads: usize,
}

#[derive(Debug, Deserialize)]
pub struct VisualConfig {
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default = "default_wave_color")]
    pub color: String,
    #[serde(default = "default_background_type")]
    pub background_type: String,
    #[serde(default = "default_background")]
    pub background: String,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    /// Percent.
    #[serde(default = "default_volume")]
    pub volume: u32,
    /// Percent.
    #[serde(default = "default_music_volume")]
    pub music_volume: u32,
    #[serde(default = "default_bands")]
    pub bands: usize,
}

#[derive(Debug, Deserialize)]
pub struct IntroConfig {
    #[serde(default = "default_intro_clip_duration")]
    pub duration: f64,
    #[serde(default = "default_title_color")]
    pub title_color: String,
}

#[derive(Debug, Deserialize)]
pub struct SubtitleConfig {
    pub font_size: Option<f32>,
    #[serde(default = "default_subtitle_color")]
    pub color: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct FontConfig {
    /// File path or http(s) URL.
    pub path: Option<String>,
    /// Replaces the built-in search list when non-empty.
    #[serde(default)]
    pub system: Vec<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct EndScreenConfig {
    pub path: Option<PathBuf>,
    #[serde(default = "default_end_screen_duration")]
    pub duration: f64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            preset: default_preset(),
            crf: default_crf(),
            threads: defaults::THREADS,
        }
    }
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            style: default_style(),
            color: default_wave_color(),
            background_type: default_background_type(),
            background: default_background(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            music_volume: default_music_volume(),
            bands: default_bands(),
        }
    }
}

impl Default for IntroConfig {
    fn default() -> Self {
        Self {
            duration: default_intro_clip_duration(),
            title_color: default_title_color(),
        }
    }
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            font_size: None,
            color: default_subtitle_color(),
        }
    }
}

impl Default for EndScreenConfig {
    fn default() -> Self {
        Self {
            path: None,
            duration: default_end_screen_duration(),
        }
    }
}

fn default_width() -> u32 { defaults::WIDTH }
fn default_height() -> u32 { defaults::HEIGHT }
fn default_fps() -> u32 { defaults::FPS }
fn default_preset() -> String { defaults::PRESET.into() }
fn default_crf() -> u32 { defaults::CRF }
fn default_style() -> String { defaults::STYLE.into() }
fn default_wave_color() -> String { defaults::WAVE_COLOR.into() }
fn default_background_type() -> String { defaults::BACKGROUND_TYPE.into() }
fn default_background() -> String { defaults::BACKGROUND.into() }
fn default_volume() -> u32 { defaults::VOLUME }
fn default_music_volume() -> u32 { defaults::MUSIC_VOLUME }
fn default_bands() -> usize { defaults::BANDS }
fn default_intro_clip_duration() -> f64 { defaults::INTRO_CLIP_DURATION }
fn default_title_color() -> String { defaults::TITLE_COLOR.into() }
fn default_subtitle_color() -> String { defaults::SUBTITLE_COLOR.into() }
fn default_end_screen_duration() -> f64 { defaults::END_SCREEN_DURATION }

pub fn load_config(path: &Path) -> Result<Config, RenderError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| RenderError::Config(format!("{}: {}", path.display(), e)))?;
    toml::from_str(&content).map_err(|e| RenderError::Config(format!("{}: {}", path.display(), e)))
}

/// `./wavereel.toml`, then the per-user config locations.
pub fn find_config() -> Option<PathBuf> {
    let local = PathBuf::from("wavereel.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("wavereel").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("wavereel").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

pub fn default_system_fonts() -> Vec<PathBuf> {
    SYSTEM_FONTS.iter().map(PathBuf::from).collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct IntroSettings {
    pub title: String,
    pub subtitle: Option<String>,
    pub duration: f64,
    pub animated: bool,
    pub avatar: Option<PathBuf>,
    /// Image or video; the main background when unset.
    pub background: Option<PathBuf>,
    pub title_color: Color,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EndScreen {
    pub video: PathBuf,
    pub duration: f64,
}

impl EndScreen {
    /// `path` names either the clip itself or a directory holding
    /// `end_screen_{width}x{height}.mp4`. Returns `None` with a warning when
    /// no clip exists for this resolution.
    pub fn resolve(path: &Path, width: u32, height: u32, duration: f64) -> Option<Self> {
        let video = if path.is_dir() {
            path.join(format!("end_screen_{}x{}.mp4", width, height))
        } else {
            path.to_path_buf()
        };
        if !video.is_file() {
            log::warn!(
                "End screen not found for {}x{} ({}); skipping",
                width,
                height,
                video.display()
            );
            return None;
        }
        Some(Self {
            video,
            duration: duration.max(0.0),
        })
    }
}

/// Everything a render needs, resolved once at startup.
#[derive(Clone, Debug)]
pub struct RenderSettings {
    pub input: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,

    pub style: String,
    pub wave_color: Color,
    pub background: BackgroundSpec,
    pub avatar: Option<PathBuf>,
    pub avatar_size: Option<u32>,
    pub bands: usize,
    pub seed: u64,
    /// Seconds; positive delays the visualizer behind the audio.
    pub wave_sync: f64,

    pub subtitles: Option<PathBuf>,
    pub subtitle_font_size: Option<f32>,
    pub subtitle_color: Color,
    pub font: Option<String>,
    pub system_fonts: Vec<PathBuf>,

    /// Linear gain for the main track.
    pub volume: f64,
    /// Linear gain for background music.
    pub music_volume: f64,
    pub intro_sound: Option<PathBuf>,
    /// Seconds the intro sound plays before the main track starts.
    pub intro_sound_duration: f64,
    pub outro_sound: Option<PathBuf>,
    pub music: Option<PathBuf>,

    pub intro: Option<IntroSettings>,
    pub end_screen: Option<EndScreen>,
    pub thumbnail: Option<PathBuf>,

    pub preset: String,
    pub crf: u32,
    pub bitrate: Option<String>,
    pub threads: usize,
}

impl RenderSettings {
    pub fn encoder(&self) -> EncoderSettings {
        EncoderSettings {
            width: self.width,
            height: self.height,
            fps: self.fps,
            preset: self.preset.clone(),
            crf: self.crf,
            bitrate: self.bitrate.clone(),
            threads: self.threads,
        }
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::Config(format!(
                "resolution {}x{} is empty",
                self.width, self.height
            )));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(RenderError::Config(format!(
                "resolution {}x{} must be even for yuv420p",
                self.width, self.height
            )));
        }
        if self.fps == 0 {
            return Err(RenderError::Config("fps must be positive".into()));
        }
        if self.bands == 0 {
            return Err(RenderError::Config("band count must be positive".into()));
        }
        if let Some(intro) = &self.intro {
            if intro.duration <= 0.0 {
                return Err(RenderError::Config("intro duration must be positive".into()));
            }
        }
        Ok(())
    }

    /// Drop optional audio files that do not exist, warning for each.
    pub fn retain_existing_sounds(&mut self) {
        for (slot, what) in [
            (&mut self.intro_sound, "intro sound"),
            (&mut self.outro_sound, "outro sound"),
            (&mut self.music, "background music"),
        ] {
            if let Some(path) = slot.as_ref() {
                if !path.is_file() {
                    log::warn!("{} not found: {}; leaving it out of the mix", what, path.display());
                    *slot = None;
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn settings(input: &Path, output: &Path) -> RenderSettings {
        RenderSettings {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            width: 64,
            height: 36,
            fps: 10,
            style: "bars".into(),
            wave_color: [0, 255, 136],
            background: BackgroundSpec::Color("#101010".into()),
            avatar: None,
            avatar_size: None,
            bands: 8,
            seed: 1,
            wave_sync: 0.0,
            subtitles: None,
            subtitle_font_size: None,
            subtitle_color: [255, 255, 255],
            font: None,
            system_fonts: Vec::new(),
            volume: 1.0,
            music_volume: 0.15,
            intro_sound: None,
            intro_sound_duration: 3.0,
            outro_sound: None,
            music: None,
            intro: None,
            end_screen: None,
            thumbnail: None,
            preset: "ultrafast".into(),
            crf: 23,
            bitrate: None,
            threads: 0,
        }
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [output]
            width = 1280
            [audio]
            music_volume = 20
            [end_screen]
            path = "templates"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.output.width, 1280);
        assert_eq!(cfg.output.height, defaults::HEIGHT);
        assert_eq!(cfg.output.preset, defaults::PRESET);
        assert_eq!(cfg.audio.music_volume, 20);
        assert_eq!(cfg.audio.volume, defaults::VOLUME);
        assert_eq!(cfg.visual.style, defaults::STYLE);
        assert_eq!(cfg.end_screen.path, Some(PathBuf::from("templates")));
        assert_eq!(cfg.end_screen.duration, defaults::END_SCREEN_DURATION);
        assert!(cfg.subtitle.font_size.is_none());
    }

    #[test]
    fn load_reports_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wavereel.toml");
        std::fs::write(&path, "[output\nwidth = ").unwrap();
        assert!(matches!(load_config(&path), Err(RenderError::Config(_))));

        std::fs::write(&path, "[visual]\nstyle = \"radial\"\n").unwrap();
        assert_eq!(load_config(&path).unwrap().visual.style, "radial");
    }

    #[test]
    fn end_screen_resolves_by_resolution() {
        let dir = tempfile::tempdir().unwrap();
        assert!(EndScreen::resolve(dir.path(), 1920, 1080, 5.0).is_none());

        let clip = dir.path().join("end_screen_1920x1080.mp4");
        std::fs::write(&clip, b"").unwrap();
        let end = EndScreen::resolve(dir.path(), 1920, 1080, 5.0).unwrap();
        assert_eq!(end.video, clip);
        assert!(EndScreen::resolve(dir.path(), 1280, 720, 5.0).is_none());
        assert_eq!(EndScreen::resolve(&clip, 1, 1, -2.0).unwrap().duration, 0.0);
    }

    #[test]
    fn missing_sounds_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let music = dir.path().join("music.mp3");
        std::fs::write(&music, b"").unwrap();
        let mut s = settings(Path::new("in.wav"), Path::new("out.mp4"));
        s.music = Some(music.clone());
        s.intro_sound = Some(dir.path().join("nope.mp3"));
        s.retain_existing_sounds();
        assert_eq!(s.music, Some(music));
        assert!(s.intro_sound.is_none());
    }

    #[test]
    fn validate_rejects_odd_sizes() {
        let mut s = settings(Path::new("in.wav"), Path::new("out.mp4"));
        assert!(s.validate().is_ok());
        s.width = 63;
        assert!(matches!(s.validate(), Err(RenderError::Config(_))));
        s.width = 64;
        s.fps = 0;
        assert!(s.validate().is_err());
    }
}
