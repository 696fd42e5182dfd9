//! Lumen engine crate.
//!
//! GPU substrate for the retained-mode UI layer: pixel geometry, CPU
//! compositing, the render executor that owns the device, textures, and
//! window sessions.

pub mod coords;
pub mod core;
pub mod device;
pub mod exec;
pub mod logging;
pub mod paint;
pub mod texture;
pub mod window;
