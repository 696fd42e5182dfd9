//! CPU-side paint model.
//!
//! Scope:
//! - color representation (straight-alpha sRGB bytes, the texture upload format)
//! - pixel operations on packed RGBA buffers (`image::RgbaImage`)
//!
//! Geometry types remain in `coords`.

pub mod color;
pub mod pixels;

pub use color::Color;
pub use pixels::{blend_image, blend_pixel, clear_rect, copy_region, fill_rect};
