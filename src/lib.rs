pub mod audio;
pub mod config;
pub mod encode;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod subtitle;
pub mod timeline;
pub mod visualizer;
