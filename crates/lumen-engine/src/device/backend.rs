use image::RgbaImage;

use crate::coords::{Rect, Size};
use crate::window::PlatformWindow;

use super::SamplerPolicy;

/// Handle of a GPU-resident texture. Only meaningful while the texture is active.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TextureId(pub(crate) u64);

/// Handle of an off-screen render target attached to a texture.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct FramebufferId(pub(crate) u64);

/// Handle of a window's presentable surface.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SurfaceId(pub(crate) u64);

/// Raw device operations.
///
/// Implementations never return errors directly: failures are recorded and
/// surfaced through [`take_error`](GpuBackend::take_error), which [`Gpu`](super::Gpu)
/// calls after every state-changing operation. Ids are allocated by `Gpu`.
///
/// A backend is constructed and used on the render executor thread only.
pub trait GpuBackend {
    fn name(&self) -> &'static str;

    /// Allocates storage of `size`. `pixels`, when present, has exactly that size.
    fn create_texture(
        &mut self,
        id: TextureId,
        size: Size,
        pixels: Option<&RgbaImage>,
        sampler: &SamplerPolicy,
    );

    /// Uploads `rect` from `data`, whose rows are `bytes_per_row` apart.
    fn write_texture(&mut self, id: TextureId, rect: Rect, data: &[u8], bytes_per_row: u32);

    fn bind_texture(&mut self, unit: u32, id: TextureId);

    fn delete_texture(&mut self, id: TextureId);

    fn read_texture(&mut self, id: TextureId) -> Option<RgbaImage>;

    fn create_framebuffer(&mut self, id: FramebufferId, texture: TextureId);

    /// `None` restores the default (window) target.
    fn bind_framebuffer(&mut self, id: Option<FramebufferId>);

    fn delete_framebuffer(&mut self, id: FramebufferId);

    fn create_surface(&mut self, id: SurfaceId, window: &PlatformWindow, size: Size);

    fn resize_surface(&mut self, id: SurfaceId, size: Size);

    fn make_current(&mut self, id: SurfaceId);

    /// Draws `texture` 1:1 onto the surface's pending frame.
    fn blit(&mut self, surface: SurfaceId, texture: TextureId);

    /// Swaps: presents the pending frame (or a cleared one if nothing was drawn).
    fn present(&mut self, surface: SurfaceId);

    fn destroy_surface(&mut self, id: SurfaceId);

    /// Last presented surface contents, where the backend can provide them.
    fn read_surface(&mut self, id: SurfaceId) -> Option<RgbaImage> {
        let _ = id;
        None
    }

    /// Centralized error hook: returns and clears the first failure since the last call.
    fn take_error(&mut self) -> Option<String>;
}
