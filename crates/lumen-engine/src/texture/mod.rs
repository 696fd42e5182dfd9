//! GPU textures with an optional CPU mirror.
//!
//! A [`Texture`] is plain data until it is activated; every method that
//! touches the device takes the render-thread `&mut Gpu`, so textures are
//! driven from executor jobs (usually through a window session).

mod error;
mod gpu_texture;

pub use error::TextureError;
pub use gpu_texture::{normalize_rgba, Texture};
