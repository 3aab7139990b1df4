//! Render orchestration: decode, analyse, compose frames, encode.

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::Path;

use crate::audio::analysis::analyze;
use crate::audio::decode::decode_audio;
use crate::config::{IntroSettings, RenderSettings};
use crate::encode::ffmpeg::{
    append_end_screen, audio_args, embed_cover, extract_video_frames, is_video_file, run_ffmpeg,
    video_args, AudioInputs, FfmpegEncoder, FrameSink,
};
use crate::encode::mix::{AudioFilter, AudioMixGraphBuilder, MixConfig, MixPlan};
use crate::error::RenderError;
use crate::render::avatar::{self, load_avatar, PlacedAvatar};
use crate::render::background::load_cover;
use crate::render::compositor::Compositor;
use crate::render::intro::{intro_avatar_size, title_font_size, IntroBackdrop, IntroClip, IntroTitle};
use crate::render::text::{resolve_font, TextRenderer};
use crate::subtitle::cue::load_segments;
use crate::subtitle::render::{default_font_size, SubtitleStyle};
use crate::timeline::{TimelineConfig, TimelineScheduler};
use crate::visualizer::{self, VisualizerParams};

/// What a finished video render produced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderSummary {
    pub frames: usize,
    /// Seconds, including any appended end screen.
    pub duration: f64,
}

/// Keep going without an optional asset that failed to load.
fn optional<T>(result: Result<T, RenderError>, what: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Skipping {}: {}", what, e);
            None
        }
    }
}

pub fn mix_config(settings: &RenderSettings, main_duration: f64) -> MixConfig {
    MixConfig {
        intro_clip: settings.intro.as_ref().map(|i| i.duration),
        intro_sound: settings
            .intro_sound
            .as_ref()
            .map(|_| settings.intro_sound_duration),
        outro_sound: settings.outro_sound.is_some(),
        background_music: settings.music.is_some(),
        main_duration,
        end_screen: settings.end_screen.as_ref().map_or(0.0, |e| e.duration),
        volume: settings.volume,
        music_volume: settings.music_volume,
    }
}

fn audio_inputs(settings: &RenderSettings) -> AudioInputs {
    AudioInputs {
        main: settings.input.clone(),
        intro: settings.intro_sound.clone(),
        outro: settings.outro_sound.clone(),
        music: settings.music.clone(),
    }
}

fn log_mix_plan(plan: &MixPlan) {
    for s in &plan.sources {
        let window = s
            .trim
            .map_or_else(|| "full".to_string(), |(start, end)| format!("{:.2}s-{:.2}s", start, end));
        log::info!(
            "Audio {:<5} input {} delay {}ms window {} gain {:.2}{}",
            s.source.label(),
            s.input,
            s.delay_ms,
            window,
            s.gain,
            if s.looped { " (looped)" } else { "" }
        );
    }
    match &plan.filter {
        AudioFilter::Graph(graph) => log::debug!("Audio filter graph: {}", graph),
        AudioFilter::Volume(v) => log::info!("Audio volume: {:.2}", v),
        AudioFilter::Passthrough => {}
    }
}

fn build_intro(
    settings: &RenderSettings,
    intro: &IntroSettings,
    background: &RgbImage,
    text: Option<TextRenderer>,
    frame_count: usize,
) -> IntroClip {
    let (w, h, fps) = (settings.width, settings.height, settings.fps);
    let backdrop = match &intro.background {
        Some(path) if is_video_file(path) => {
            let frames = optional(
                extract_video_frames(path, w, h, fps, frame_count),
                "intro video",
            )
            .unwrap_or_default();
            IntroBackdrop::from_video(frames, background.clone(), frame_count)
        }
        Some(path) => IntroBackdrop::Still(
            optional(load_cover(path, w, h), "intro background").unwrap_or_else(|| background.clone()),
        ),
        None => IntroBackdrop::Still(background.clone()),
    };

    let title = IntroTitle {
        title: intro.title.clone(),
        subtitle: intro.subtitle.clone(),
        color: intro.title_color,
    };
    log::info!(
        "Preparing intro clip ({} frames, {})",
        frame_count,
        if intro.animated { "animated" } else { "static" }
    );
    let clip = IntroClip::new(backdrop, title, text, intro.animated, fps, frame_count);
    match intro
        .avatar
        .as_deref()
        .and_then(|path| optional(load_avatar(path, intro_avatar_size(w, h)), "intro avatar"))
    {
        Some(img) => clip.with_avatar(img),
        None => clip,
    }
}

/// Write every frame of `timeline` to `sink` in frame order.
///
/// Frames are rendered in parallel batches; a batch is written only after it
/// is complete, so a sink error stops the render at a batch boundary.
pub fn stream_frames<S: FrameSink + ?Sized>(
    compositor: &Compositor,
    timeline: &TimelineScheduler,
    sink: &mut S,
    progress: &ProgressBar,
) -> Result<(), RenderError> {
    let plans: Vec<_> = timeline.plans().collect();
    let batch = (rayon::current_num_threads() * 2).max(1);
    for chunk in plans.chunks(batch) {
        let frames: Vec<RgbImage> = chunk.par_iter().map(|plan| compositor.render(plan)).collect();
        for frame in &frames {
            sink.write_frame(frame.as_raw())?;
            progress.inc(1);
        }
    }
    Ok(())
}

/// Stream every frame into `sink` and finish it. On failure the sink is
/// dropped first, then whatever it wrote to `output` is removed.
pub fn encode_frames<S: FrameSink>(
    compositor: &Compositor,
    timeline: &TimelineScheduler,
    mut sink: S,
    output: &Path,
    progress: &ProgressBar,
) -> Result<(), RenderError> {
    let encoded = stream_frames(compositor, timeline, &mut sink, progress).and_then(|()| sink.finish());
    if let Err(e) = encoded {
        progress.abandon();
        drop(sink);
        if output.exists() {
            if let Err(rm) = std::fs::remove_file(output) {
                log::warn!("Could not remove partial output {}: {}", output.display(), rm);
            }
        }
        return Err(e);
    }
    progress.finish_with_message("Rendering complete");
    Ok(())
}

pub fn save_thumbnail(frame: &RgbImage, path: &Path) -> Result<(), RenderError> {
    let jpeg = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"));
    if jpeg {
        let file = std::fs::File::create(path).map_err(|e| RenderError::asset(path, e))?;
        JpegEncoder::new_with_quality(std::io::BufWriter::new(file), 95)
            .encode_image(frame)
            .map_err(|e| RenderError::asset(path, e))
    } else {
        frame.save(path).map_err(|e| RenderError::asset(path, e))
    }
}

fn progress_bar(total: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")
            .context("Invalid progress bar template")?
            .progress_chars("=>-"),
    );
    Ok(pb)
}

/// Assemble the per-frame renderer and the timeline for `settings`.
fn prepare(settings: &RenderSettings) -> Result<(Compositor, TimelineScheduler, f64)> {
    let (w, h, fps) = (settings.width, settings.height, settings.fps);

    log::info!("Decoding audio...");
    let audio = decode_audio(&settings.input)
        .with_context(|| format!("Failed to decode {}", settings.input.display()))?;
    log::info!(
        "Decoded {:.1}s of audio at {}Hz",
        audio.duration(),
        audio.sample_rate
    );

    log::info!("Analyzing audio...");
    let features = analyze(&audio.samples, audio.sample_rate, fps, settings.bands)
        .context("Audio analysis failed")?;
    let main_duration = audio.duration();
    drop(audio);

    let background = settings
        .background
        .render(w, h)
        .context("Failed to prepare background")?;

    let avatar = settings.avatar.as_deref().and_then(|path| {
        let size = settings
            .avatar_size
            .unwrap_or_else(|| avatar::default_size(w, h));
        optional(load_avatar(path, size), "avatar")
    });

    let params = VisualizerParams {
        width: w,
        height: h,
        color: settings.wave_color,
        avatar_size: avatar.as_ref().map(|a| a.width()),
        seed: settings.seed,
    };
    let visualizer = visualizer::create(&settings.style, &params, &features);

    let segments = match &settings.subtitles {
        Some(path) => load_segments(path)
            .with_context(|| format!("Failed to load subtitles from {}", path.display()))?,
        None => Vec::new(),
    };
    let font = if settings.intro.is_some() || !segments.is_empty() {
        resolve_font(settings.font.as_deref(), &settings.system_fonts)
    } else {
        None
    };
    let has_subtitles = !segments.is_empty();

    let timeline = TimelineScheduler::new(
        TimelineConfig::new(fps, settings.intro.as_ref().map(|i| i.duration), settings.wave_sync),
        features.len(),
        segments,
    );

    let mut compositor = Compositor::new(background.clone(), features, visualizer);
    if let Some(img) = avatar {
        compositor = compositor.with_avatar(PlacedAvatar::centered(img, w, h));
    }
    if let Some(intro) = &settings.intro {
        let text = font.clone().map(|f| TextRenderer::new(f, title_font_size(w)));
        compositor = compositor.with_intro(build_intro(
            settings,
            intro,
            &background,
            text,
            timeline.intro_frames(),
        ));
    }
    if let (true, Some(font)) = (has_subtitles, font) {
        let size = settings
            .subtitle_font_size
            .unwrap_or_else(|| default_font_size(h));
        let style = SubtitleStyle {
            color: settings.subtitle_color,
            ..SubtitleStyle::default()
        };
        compositor = compositor.with_subtitles(TextRenderer::new(font, size), style);
    }

    Ok((compositor, timeline, main_duration))
}

pub fn render_video(settings: &RenderSettings) -> Result<RenderSummary> {
    settings.validate()?;
    log::info!("Input: {}", settings.input.display());
    log::info!("Output: {}", settings.output.display());
    log::info!(
        "Resolution: {}x{} @ {}fps, style {}",
        settings.width,
        settings.height,
        settings.fps,
        settings.style
    );

    let (compositor, timeline, main_duration) = prepare(settings)?;
    let total = timeline.total_frames();

    let plan = AudioMixGraphBuilder::new(mix_config(settings, main_duration)).build(1);
    log_mix_plan(&plan);

    let thumbnail = settings.thumbnail.as_deref().and_then(|path| {
        log::info!("Generating thumbnail: {}", path.display());
        optional(save_thumbnail(&compositor.thumbnail(settings.fps), path), "thumbnail").map(|()| path)
    });

    log::info!("Starting FFmpeg encoder...");
    let encoder_settings = settings.encoder();
    let args = video_args(
        &encoder_settings,
        &audio_inputs(settings),
        &plan,
        &settings.output,
        settings.end_screen.is_none(),
    );
    log::debug!("ffmpeg {}", args.join(" "));
    let encoder = FfmpegEncoder::spawn(&args, encoder_settings.frame_size())?;

    log::info!("Rendering {} frames...", total);
    let pb = progress_bar(total)?;
    encode_frames(&compositor, &timeline, encoder, &settings.output, &pb)
        .context("Video encoding failed")?;

    let mut duration = total as f64 / settings.fps as f64;
    if let Some(end) = &settings.end_screen {
        match append_end_screen(&settings.output, &end.video) {
            Ok(()) => duration += end.duration,
            Err(e) => log::warn!("Could not add end screen: {}", e),
        }
    }
    if let Some(path) = thumbnail {
        if let Err(e) = embed_cover(&settings.output, path) {
            log::warn!("Could not embed cover image: {}", e);
        }
    }

    log::info!("Done! Output: {} ({:.1}s)", settings.output.display(), duration);
    Ok(RenderSummary {
        frames: total,
        duration,
    })
}

/// Mix the audio tracks without video. Returns the mixed duration in seconds.
pub fn render_audio(settings: &RenderSettings) -> Result<f64> {
    log::info!("Loading audio...");
    let audio = decode_audio(&settings.input)
        .with_context(|| format!("Failed to decode {}", settings.input.display()))?;
    let main_duration = audio.duration();
    log::info!("Audio duration: {:.1}s", main_duration);

    let builder = AudioMixGraphBuilder::new(mix_config(settings, main_duration));
    let total = builder.total_duration();
    let plan = builder.build(0);
    log_mix_plan(&plan);

    let args = audio_args(&audio_inputs(settings), &plan, &settings.output);
    log::debug!("ffmpeg {}", args.join(" "));
    run_ffmpeg(&args).context("Audio mix failed")?;

    log::info!("Done! Output: {} ({:.1}s)", settings.output.display(), total);
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::settings;
    use crate::config::EndScreen;
    use crate::render::compositor::tests::compositor;

    #[derive(Default)]
    struct MemorySink {
        frames: Vec<Vec<u8>>,
        fail_at: Option<usize>,
        fail_finish: bool,
    }

    impl FrameSink for MemorySink {
        fn write_frame(&mut self, frame: &[u8]) -> Result<(), RenderError> {
            if self.fail_at == Some(self.frames.len()) {
                return Err(RenderError::Encoder("pipe closed".into()));
            }
            self.frames.push(frame.to_vec());
            Ok(())
        }

        fn finish(&mut self) -> Result<(), RenderError> {
            if self.fail_finish {
                return Err(RenderError::Encoder("exit status: 1".into()));
            }
            Ok(())
        }
    }

    fn timeline() -> TimelineScheduler {
        TimelineScheduler::new(TimelineConfig::new(10, Some(1.0), 0.0), 3, Vec::new())
    }

    #[test]
    fn frames_arrive_in_order() {
        let c = compositor(true);
        let timeline = timeline();
        let mut sink = MemorySink::default();
        stream_frames(&c, &timeline, &mut sink, &ProgressBar::hidden()).unwrap();

        assert_eq!(sink.frames.len(), 13);
        for (i, frame) in sink.frames.iter().enumerate() {
            assert_eq!(frame.len(), 160 * 90 * 3);
            assert_eq!(frame, c.render(&timeline.plan(i)).as_raw(), "frame {}", i);
        }
    }

    #[test]
    fn sink_failure_stops_stream() {
        let c = compositor(true);
        let mut sink = MemorySink {
            fail_at: Some(4),
            ..MemorySink::default()
        };
        let err = stream_frames(&c, &timeline(), &mut sink, &ProgressBar::hidden()).unwrap_err();
        assert!(matches!(err, RenderError::Encoder(_)));
        assert_eq!(sink.frames.len(), 4);
    }

    #[test]
    fn failed_encode_removes_output() {
        let c = compositor(true);
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.mp4");

        for sink in [
            MemorySink {
                fail_at: Some(2),
                ..MemorySink::default()
            },
            MemorySink {
                fail_finish: true,
                ..MemorySink::default()
            },
        ] {
            std::fs::write(&output, b"partial").unwrap();
            let err = encode_frames(&c, &timeline(), sink, &output, &ProgressBar::hidden()).unwrap_err();
            assert!(matches!(err, RenderError::Encoder(_)));
            assert!(!output.exists());
        }
    }

    #[test]
    fn finished_encode_keeps_output() {
        let c = compositor(false);
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        std::fs::write(&output, b"video").unwrap();
        encode_frames(&c, &timeline(), MemorySink::default(), &output, &ProgressBar::hidden()).unwrap();
        assert!(output.exists());
    }

    #[test]
    fn thumbnails_save_as_png_and_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let frame = compositor(false).thumbnail(10);
        for name in ["thumb.png", "thumb.JPG"] {
            let path = dir.path().join(name);
            save_thumbnail(&frame, &path).unwrap();
            let loaded = image::open(&path).unwrap();
            assert_eq!((loaded.width(), loaded.height()), (160, 90));
        }
    }

    #[test]
    fn mix_config_follows_present_sources() {
        let mut s = settings(Path::new("in.wav"), Path::new("out.mp4"));
        let plain = mix_config(&s, 20.0);
        assert_eq!(plain.intro_clip, None);
        assert_eq!(plain.intro_sound, None);
        assert_eq!(plain.end_screen, 0.0);

        s.intro_sound = Some("intro.mp3".into());
        s.intro_sound_duration = 5.0;
        s.outro_sound = Some("outro.mp3".into());
        s.intro = Some(IntroSettings {
            title: "T".into(),
            subtitle: None,
            duration: 3.0,
            animated: true,
            avatar: None,
            background: None,
            title_color: [255, 255, 255],
        });
        s.end_screen = Some(EndScreen {
            video: "end.mp4".into(),
            duration: 5.0,
        });
        let full = mix_config(&s, 20.0);
        assert_eq!(full.intro_clip, Some(3.0));
        assert_eq!(full.intro_sound, Some(5.0));
        assert!(full.outro_sound);
        assert!(!full.background_music);
        assert_eq!(full.end_screen, 5.0);
        assert_eq!(AudioMixGraphBuilder::new(full).main_delay_ms(), 8000);
    }

    #[test]
    fn undecodable_input_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("broken.wav");
        std::fs::write(&input, b"not audio at all").unwrap();
        let output = dir.path().join("out.mp4");
        let err = render_video(&settings(&input, &output)).unwrap_err();
        assert!(matches!(err.downcast_ref::<RenderError>(), Some(RenderError::Decode(_))));
        assert!(!output.exists());
    }
}
