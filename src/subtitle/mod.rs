pub mod cue;
pub mod render;
