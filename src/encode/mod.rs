pub mod ffmpeg;
pub mod mix;
