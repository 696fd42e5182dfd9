//! GPU device layer.
//!
//! This module is responsible for:
//! - the device seam (`GpuBackend`) and its wgpu / headless implementations
//! - `Gpu`, the render-thread handle every GPU call goes through
//! - the centralized post-call error check
//!
//! `Gpu` is only ever lent out inside render-executor jobs (see `exec`), so no
//! other thread can issue a raw device call.

mod backend;
mod blit;
mod error;
mod gpu;
mod headless;
mod init;
mod surface;
mod wgpu_backend;

pub use backend::{FramebufferId, GpuBackend, SurfaceId, TextureId};
pub use error::{GpuError, SurfaceErrorAction};
pub use gpu::{Gpu, RenderTarget};
pub use headless::HeadlessBackend;
pub use init::{FilterMode, GpuInit, SamplerPolicy, WrapMode};
pub use wgpu_backend::{WgpuBackend, TEXTURE_FORMAT};
