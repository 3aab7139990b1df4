pub mod animation;
pub mod avatar;
pub mod background;
pub mod canvas;
pub mod compositor;
pub mod intro;
pub mod text;
