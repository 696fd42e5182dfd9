//! Pixel-space geometry shared by textures, windows and the viewport tree.
//!
//! Canonical space:
//! - Integer physical pixels
//! - Origin top-left
//! - +X right, +Y down
//!
//! Every viewport presents its own local space starting at the origin; window
//! coordinates are only used for hit testing.

mod point;
mod rect;

pub use point::{Point, Size};
pub use rect::Rect;
