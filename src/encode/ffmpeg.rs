use image::RgbImage;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;

use super::mix::{AudioFilter, AudioSource, FilterGraph, MixPlan};
use crate::error::RenderError;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "m4v"];

/// Consumer of raw `width * height * 3` RGB frames, in frame order.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), RenderError>;
    fn finish(&mut self) -> Result<(), RenderError>;
}

pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| VIDEO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Video stream parameters for the main encode.
#[derive(Clone, Debug, PartialEq)]
pub struct EncoderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub preset: String,
    pub crf: u32,
    pub bitrate: Option<String>,
    /// 0 lets ffmpeg decide.
    pub threads: usize,
}

impl EncoderSettings {
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// Audio files feeding the mix.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AudioInputs {
    pub main: PathBuf,
    pub intro: Option<PathBuf>,
    pub outro: Option<PathBuf>,
    pub music: Option<PathBuf>,
}

impl AudioInputs {
    fn path(&self, source: AudioSource) -> Option<&Path> {
        match source {
            AudioSource::Main => Some(&self.main),
            AudioSource::IntroSound => self.intro.as_deref(),
            AudioSource::OutroSound => self.outro.as_deref(),
            AudioSource::BackgroundMusic => self.music.as_deref(),
        }
    }
}

fn strings<const N: usize>(items: [&str; N]) -> [String; N] {
    items.map(String::from)
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn push_extra_inputs(args: &mut Vec<String>, inputs: &AudioInputs, plan: &MixPlan) {
    for source in plan.extra_inputs() {
        let Some(path) = inputs.path(source.source) else {
            continue;
        };
        if source.looped {
            args.extend(strings(["-stream_loop", "-1"]));
        }
        args.extend(["-i".into(), path_arg(path)]);
    }
}

/// Returns true when the graph output must be mapped explicitly.
fn push_audio_filter(args: &mut Vec<String>, plan: &MixPlan) -> bool {
    match &plan.filter {
        AudioFilter::Graph(graph) => {
            args.extend(["-filter_complex".into(), graph.to_string()]);
            true
        }
        AudioFilter::Volume(v) => {
            args.extend(["-af".into(), format!("volume={}", v)]);
            false
        }
        AudioFilter::Passthrough => false,
    }
}

/// ffmpeg arguments for the main encode: raw RGB frames on stdin as input 0,
/// the main track as input 1, then the optional mix sources.
///
/// `shortest` is off when an end screen follows, since the outro audio runs
/// past the last raw frame.
pub fn video_args(
    settings: &EncoderSettings,
    inputs: &AudioInputs,
    plan: &MixPlan,
    output: &Path,
    shortest: bool,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-loglevel".into(), "error".into(),
        "-f".into(), "rawvideo".into(),
        "-pixel_format".into(), "rgb24".into(),
        "-video_size".into(), format!("{}x{}", settings.width, settings.height),
        "-framerate".into(), settings.fps.to_string(),
        "-i".into(), "pipe:0".into(),
        "-i".into(), path_arg(&inputs.main),
    ];
    push_extra_inputs(&mut args, inputs, plan);

    args.extend([
        "-c:v".into(), "libx264".into(),
        "-preset".into(), settings.preset.clone(),
        "-tune".into(), "animation".into(),
    ]);
    match &settings.bitrate {
        Some(br) => args.extend(["-b:v".into(), br.clone()]),
        None => args.extend(["-crf".into(), settings.crf.to_string()]),
    }
    if settings.threads > 0 {
        args.extend(["-threads".into(), settings.threads.to_string()]);
    }

    if push_audio_filter(&mut args, plan) {
        args.extend([
            "-map".into(), "0:v".into(),
            "-map".into(), format!("[{}]", FilterGraph::OUTPUT),
        ]);
    }

    args.extend(strings([
        "-c:a", "aac",
        "-b:a", "192k",
        "-pix_fmt", "yuv420p",
    ]));
    if shortest {
        args.push("-shortest".into());
    }
    args.push(path_arg(output));
    args
}

/// ffmpeg arguments for an audio-only mix; the main track is input 0.
pub fn audio_args(inputs: &AudioInputs, plan: &MixPlan, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-loglevel".into(), "error".into(),
        "-i".into(), path_arg(&inputs.main),
    ];
    push_extra_inputs(&mut args, inputs, plan);
    if push_audio_filter(&mut args, plan) {
        args.extend(["-map".into(), format!("[{}]", FilterGraph::OUTPUT)]);
    }

    let ext = output
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("mp3") => args.extend(strings(["-c:a", "libmp3lame", "-b:a", "192k"])),
        Some("wav") => args.extend(strings(["-c:a", "pcm_s16le"])),
        _ => args.extend(strings(["-c:a", "aac", "-b:a", "192k"])),
    }
    args.push(path_arg(output));
    args
}

fn spawn_stderr_reader(child: &mut Child) -> Option<JoinHandle<String>> {
    let mut stderr = child.stderr.take()?;
    Some(std::thread::spawn(move || {
        let mut buf = String::new();
        let _ = stderr.read_to_string(&mut buf);
        buf
    }))
}

/// Streams raw frames into an ffmpeg child process.
pub struct FfmpegEncoder {
    child: Child,
    stderr: Option<JoinHandle<String>>,
    frame_size: usize,
    frames: usize,
}

impl FfmpegEncoder {
    pub fn spawn(args: &[String], frame_size: usize) -> Result<Self, RenderError> {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(args);
        Self::from_command(cmd, frame_size)
    }

    fn from_command(mut cmd: Command, frame_size: usize) -> Result<Self, RenderError> {
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RenderError::Encoder(format!("failed to spawn ffmpeg ({}). Is ffmpeg installed?", e)))?;
        let stderr = spawn_stderr_reader(&mut child);
        log::info!("FFmpeg encoder started ({} bytes per frame)", frame_size);
        Ok(Self {
            child,
            stderr,
            frame_size,
            frames: 0,
        })
    }

    /// Close stdin, reap the process and turn a bad exit into an error.
    fn close(&mut self, context: &str) -> Result<(), RenderError> {
        drop(self.child.stdin.take());
        let status = self
            .child
            .wait()
            .map_err(|e| RenderError::Encoder(format!("failed to wait for ffmpeg: {}", e)))?;
        let stderr = self
            .stderr
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        if status.success() {
            return Ok(());
        }
        Err(RenderError::Encoder(format!(
            "{} ({}):\n{}",
            context,
            status,
            stderr.trim()
        )))
    }
}

impl FrameSink for FfmpegEncoder {
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), RenderError> {
        if frame.len() != self.frame_size {
            return Err(RenderError::Encoder(format!(
                "frame {} is {} bytes, expected {}",
                self.frames,
                frame.len(),
                self.frame_size
            )));
        }
        let stdin = self
            .child
            .stdin
            .as_mut()
            .ok_or_else(|| RenderError::Encoder("ffmpeg stdin already closed".into()))?;
        if let Err(e) = stdin.write_all(frame) {
            let context = format!("ffmpeg stopped accepting frames at frame {} ({})", self.frames, e);
            // prefer the exit status and stderr over the bare pipe error
            self.close(&context)?;
            return Err(RenderError::Encoder(context));
        }
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), RenderError> {
        self.close("ffmpeg exited with error")?;
        log::info!("FFmpeg encoding complete ({} frames)", self.frames);
        Ok(())
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        // still open means the render was abandoned mid-stream
        if self.child.stdin.take().is_some() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Run ffmpeg to completion.
pub fn run_ffmpeg(args: &[String]) -> Result<(), RenderError> {
    let output = Command::new("ffmpeg")
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| RenderError::Encoder(format!("failed to spawn ffmpeg: {}", e)))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RenderError::Encoder(format!(
            "ffmpeg exited with {}:\n{}",
            output.status,
            stderr.trim()
        )));
    }
    Ok(())
}

/// Decode up to `max_frames` frames of `path` at the output size and rate,
/// scaled to cover the frame and centre-cropped.
pub fn extract_video_frames(
    path: &Path,
    width: u32,
    height: u32,
    fps: u32,
    max_frames: usize,
) -> Result<Vec<RgbImage>, RenderError> {
    let filter = format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}",
        w = width,
        h = height
    );
    let rate = fps.to_string();
    let frames_arg = max_frames.to_string();
    let mut child = Command::new("ffmpeg")
        .args(["-loglevel", "error", "-i"])
        .arg(path)
        .args([
            "-vf", filter.as_str(),
            "-r", rate.as_str(),
            "-f", "rawvideo",
            "-pix_fmt", "rgb24",
            "-frames:v", frames_arg.as_str(),
            "-",
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| RenderError::asset(path, e))?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| RenderError::asset(path, "no stdout from ffmpeg"))?;
    let frame_size = width as usize * height as usize * 3;
    let mut frames = Vec::new();
    while frames.len() < max_frames {
        let mut buf = vec![0u8; frame_size];
        if stdout.read_exact(&mut buf).is_err() {
            break;
        }
        if let Some(img) = RgbImage::from_raw(width, height, buf) {
            frames.push(img);
        }
    }
    drop(stdout);
    let _ = child.wait();

    log::info!("Extracted {} intro frames from {}", frames.len(), path.display());
    Ok(frames)
}

/// Sibling path that is removed on drop unless it was renamed away.
struct TempOutput(PathBuf);

impl TempOutput {
    fn beside(output: &Path, suffix: &str) -> Self {
        let mut name = output.as_os_str().to_owned();
        name.push(suffix);
        Self(PathBuf::from(name))
    }

    fn commit(self, output: &Path) -> Result<(), RenderError> {
        std::fs::rename(&self.0, output)
            .map_err(|e| RenderError::Encoder(format!("failed to replace {}: {}", output.display(), e)))
    }
}

impl Drop for TempOutput {
    fn drop(&mut self) {
        if self.0.exists() {
            let _ = std::fs::remove_file(&self.0);
        }
    }
}

/// Rewrite `output` through ffmpeg into a temporary file and swap it in.
/// On failure the temporary file is removed and `output` is left as is.
fn rewrite_with(
    output: &Path,
    suffix: &str,
    args: impl FnOnce(&Path) -> Vec<String>,
) -> Result<(), RenderError> {
    let temp = TempOutput::beside(output, suffix);
    run_ffmpeg(&args(&temp.0))?;
    temp.commit(output)
}

pub fn end_screen_args(output: &Path, end_screen: &Path, temp: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-loglevel".into(), "error".into(),
        "-i".into(), path_arg(output),
        "-i".into(), path_arg(end_screen),
        "-filter_complex".into(), "[0:v][1:v]concat=n=2:v=1:a=0[outv]".into(),
        "-map".into(), "[outv]".into(),
        "-map".into(), "0:a".into(),
        "-c:v".into(), "libx264".into(),
        "-preset".into(), "fast".into(),
        "-crf".into(), "23".into(),
        "-c:a".into(), "copy".into(),
        "-pix_fmt".into(), "yuv420p".into(),
        "-shortest".into(),
        path_arg(temp),
    ]
}

/// Append the end screen video after the rendered frames, keeping the
/// already-mixed audio.
pub fn append_end_screen(output: &Path, end_screen: &Path) -> Result<(), RenderError> {
    log::info!("Appending end screen {}", end_screen.display());
    rewrite_with(output, ".temp.mp4", |temp| end_screen_args(output, end_screen, temp))
}

pub fn cover_args(output: &Path, image: &Path, temp: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-loglevel".into(), "error".into(),
        "-i".into(), path_arg(output),
        "-i".into(), path_arg(image),
        "-map".into(), "0".into(),
        "-map".into(), "1".into(),
        "-c".into(), "copy".into(),
        "-disposition:v:1".into(), "attached_pic".into(),
        path_arg(temp),
    ]
}

/// Embed `image` as MP4 cover art.
pub fn embed_cover(output: &Path, image: &Path) -> Result<(), RenderError> {
    log::info!("Embedding cover image {}", image.display());
    rewrite_with(output, ".cover.mp4", |temp| cover_args(output, image, temp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::mix::{AudioMixGraphBuilder, MixConfig};

    fn settings() -> EncoderSettings {
        EncoderSettings {
            width: 64,
            height: 36,
            fps: 30,
            preset: "ultrafast".into(),
            crf: 23,
            bitrate: None,
            threads: 0,
        }
    }

    fn mix(intro: bool, music: bool, volume: f64, main_input: usize) -> MixPlan {
        AudioMixGraphBuilder::new(MixConfig {
            intro_clip: None,
            intro_sound: intro.then_some(3.0),
            outro_sound: false,
            background_music: music,
            main_duration: 30.0,
            end_screen: 0.0,
            volume,
            music_volume: 0.15,
        })
        .build(main_input)
    }

    fn inputs() -> AudioInputs {
        AudioInputs {
            main: "main.wav".into(),
            intro: Some("intro.mp3".into()),
            outro: None,
            music: Some("music.mp3".into()),
        }
    }

    fn position(args: &[String], value: &str) -> Option<usize> {
        args.iter().position(|a| a == value)
    }

    #[test]
    fn video_args_order_inputs() {
        let args = video_args(&settings(), &inputs(), &mix(true, true, 1.0, 1), Path::new("out.mp4"), true);
        let main = position(&args, "main.wav").unwrap();
        let intro = position(&args, "intro.mp3").unwrap();
        let music = position(&args, "music.mp3").unwrap();
        assert!(position(&args, "pipe:0").unwrap() < main);
        assert!(main < intro && intro < music);
        assert_eq!(args[music - 3], "-stream_loop");
        assert_eq!(args[music - 2], "-1");
        assert!(args.contains(&"[aout]".to_string()));
        assert!(args.contains(&"-shortest".to_string()));
        assert_eq!(args.last().unwrap(), "out.mp4");
    }

    #[test]
    fn video_args_drop_shortest_for_end_screen() {
        let args = video_args(&settings(), &inputs(), &mix(false, false, 1.0, 1), Path::new("o.mp4"), false);
        assert!(!args.contains(&"-shortest".to_string()));
        assert!(!args.contains(&"-filter_complex".to_string()));
        assert!(!args.contains(&"-af".to_string()));
    }

    #[test]
    fn video_args_plain_volume() {
        let args = video_args(&settings(), &inputs(), &mix(false, false, 0.5, 1), Path::new("o.mp4"), true);
        let af = position(&args, "-af").unwrap();
        assert_eq!(args[af + 1], "volume=0.5");
        assert!(!args.contains(&"-map".to_string()));
    }

    #[test]
    fn video_args_bitrate_overrides_crf() {
        let s = EncoderSettings {
            bitrate: Some("8M".into()),
            threads: 4,
            ..settings()
        };
        let args = video_args(&s, &inputs(), &mix(false, false, 1.0, 1), Path::new("o.mp4"), true);
        assert!(args.contains(&"8M".to_string()));
        assert!(!args.contains(&"-crf".to_string()));
        assert_eq!(args[position(&args, "-threads").unwrap() + 1], "4");
        assert_eq!(args[position(&args, "-tune").unwrap() + 1], "animation");
    }

    #[test]
    fn audio_args_pick_codec_by_extension() {
        let plan = mix(false, true, 1.0, 0);
        let mp3 = audio_args(&inputs(), &plan, Path::new("mix.MP3"));
        assert!(mp3.contains(&"libmp3lame".to_string()));
        let wav = audio_args(&inputs(), &plan, Path::new("mix.wav"));
        assert!(wav.contains(&"pcm_s16le".to_string()));
        let m4a = audio_args(&inputs(), &plan, Path::new("mix.m4a"));
        assert!(m4a.contains(&"aac".to_string()));

        let graph = &mp3[position(&mp3, "-filter_complex").unwrap() + 1];
        assert!(graph.starts_with("[0:a]"));
        assert!(graph.contains("[1:a]"));
    }

    #[test]
    fn detects_video_extensions() {
        assert!(is_video_file(Path::new("intro.MP4")));
        assert!(is_video_file(Path::new("a/b/c.webm")));
        assert!(!is_video_file(Path::new("intro.png")));
        assert!(!is_video_file(Path::new("intro")));
    }

    #[test]
    fn temp_output_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("video.mp4");
        std::fs::write(&output, b"original").unwrap();
        let temp_path = {
            let temp = TempOutput::beside(&output, ".temp.mp4");
            std::fs::write(&temp.0, b"partial").unwrap();
            temp.0.clone()
        };
        assert!(!temp_path.exists());
        assert_eq!(std::fs::read(&output).unwrap(), b"original");
    }

    #[test]
    fn temp_output_commit_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("video.mp4");
        std::fs::write(&output, b"original").unwrap();
        let temp = TempOutput::beside(&output, ".cover.mp4");
        std::fs::write(&temp.0, b"rewritten").unwrap();
        temp.commit(&output).unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"rewritten");
    }

    #[test]
    fn rejects_wrong_frame_size() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "cat > /dev/null"]);
        let mut sink = FfmpegEncoder::from_command(cmd, 12).unwrap();
        assert!(matches!(sink.write_frame(&[0; 11]), Err(RenderError::Encoder(_))));
        sink.write_frame(&[0; 12]).unwrap();
        sink.finish().unwrap();
    }

    #[test]
    fn dead_consumer_aborts() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "exit 3"]);
        let frame = vec![0u8; 1 << 16];
        let mut sink = FfmpegEncoder::from_command(cmd, frame.len()).unwrap();
        // 16 MiB cannot sit in a pipe buffer, so a write has to fail
        let err = (0..256)
            .find_map(|_| sink.write_frame(&frame).err())
            .expect("writes to an exited encoder must fail");
        match err {
            RenderError::Encoder(msg) => assert!(msg.contains("stopped accepting frames"), "{}", msg),
            other => panic!("expected encoder error, got {:?}", other),
        }
        assert!(matches!(sink.write_frame(&frame), Err(RenderError::Encoder(_))));
    }

    #[test]
    fn failed_exit_status_surfaces_stderr() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "cat > /dev/null; echo boom >&2; exit 2"]);
        let mut sink = FfmpegEncoder::from_command(cmd, 4).unwrap();
        sink.write_frame(&[0; 4]).unwrap();
        match sink.finish() {
            Err(RenderError::Encoder(msg)) => assert!(msg.contains("boom"), "{}", msg),
            other => panic!("expected encoder error, got {:?}", other),
        }
    }

    #[test]
    fn end_screen_concat_keeps_audio() {
        let args = end_screen_args(Path::new("v.mp4"), Path::new("end.mp4"), Path::new("v.mp4.temp.mp4"));
        assert!(args.contains(&"[0:v][1:v]concat=n=2:v=1:a=0[outv]".to_string()));
        assert_eq!(args[position(&args, "0:a").unwrap() - 1], "-map");
        assert_eq!(args.last().unwrap(), "v.mp4.temp.mp4");
    }
}
