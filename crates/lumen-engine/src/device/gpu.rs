use std::collections::{BTreeMap, HashMap};

use image::RgbaImage;

use crate::coords::{Rect, Size};
use crate::window::PlatformWindow;

use super::{FramebufferId, GpuBackend, GpuError, SamplerPolicy, SurfaceId, TextureId};

/// Where draw commands currently land.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RenderTarget {
    /// The current window surface.
    Window,
    /// An off-screen framebuffer attached to a texture.
    Framebuffer(FramebufferId),
}

/// Render-thread GPU handle.
///
/// Owns the device backend plus the bookkeeping the backend does not track:
/// texture-unit bindings, the bound render target, the current surface and
/// per-surface present counts.
///
/// There is no public constructor. A `&mut Gpu` is only reachable inside jobs
/// run by [`RenderExecutor`](crate::exec::RenderExecutor).
pub struct Gpu {
    backend: Box<dyn GpuBackend>,
    sampler: SamplerPolicy,
    next_id: u64,
    units: BTreeMap<u32, TextureId>,
    target: RenderTarget,
    current: Option<SurfaceId>,
    presented: HashMap<SurfaceId, u64>,
    lost: Option<GpuError>,
}

impl Gpu {
    pub(crate) fn new(backend: Box<dyn GpuBackend>, sampler: SamplerPolicy) -> Self {
        Self {
            backend,
            sampler,
            next_id: 1,
            units: BTreeMap::new(),
            target: RenderTarget::Window,
            current: None,
            presented: HashMap::new(),
            lost: None,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn sampler(&self) -> SamplerPolicy {
        self.sampler
    }

    /// Texture bound to `unit`, if any.
    pub fn bound_texture(&self, unit: u32) -> Option<TextureId> {
        self.units.get(&unit).copied()
    }

    pub fn render_target(&self) -> RenderTarget {
        self.target
    }

    pub fn current_surface(&self) -> Option<SurfaceId> {
        self.current
    }

    /// Number of completed presents on `surface`.
    pub fn frames_presented(&self, surface: SurfaceId) -> u64 {
        self.presented.get(&surface).copied().unwrap_or(0)
    }

    /// True once a GPU call has failed. A lost `Gpu` never recovers.
    pub fn is_lost(&self) -> bool {
        self.lost.is_some()
    }

    /// Reads a texture's GPU contents back into CPU memory.
    pub fn read_texture(&mut self, id: TextureId) -> Result<RgbaImage, GpuError> {
        self.ensure_alive()?;
        let img = self.backend.read_texture(id);
        self.check("read_texture")?;
        img.ok_or_else(|| self.fail("read_texture", format!("no pixels returned for {id:?}")))
    }

    /// Last presented contents of `surface`, when the backend keeps them.
    pub fn read_surface(&mut self, id: SurfaceId) -> Result<Option<RgbaImage>, GpuError> {
        self.ensure_alive()?;
        let img = self.backend.read_surface(id);
        self.check("read_surface")?;
        Ok(img)
    }

    // ── textures ──────────────────────────────────────────────────────────

    pub(crate) fn create_texture(
        &mut self,
        size: Size,
        pixels: Option<&RgbaImage>,
    ) -> Result<TextureId, GpuError> {
        self.ensure_alive()?;
        let id = TextureId(self.alloc_id());
        self.backend.create_texture(id, size, pixels, &self.sampler);
        self.check("create_texture")?;
        log::debug!("allocated {id:?} ({}x{})", size.width, size.height);
        Ok(id)
    }

    pub(crate) fn write_texture(
        &mut self,
        id: TextureId,
        rect: Rect,
        data: &[u8],
        bytes_per_row: u32,
    ) -> Result<(), GpuError> {
        self.ensure_alive()?;
        self.backend.write_texture(id, rect, data, bytes_per_row);
        self.check("write_texture")
    }

    pub(crate) fn bind_texture(&mut self, unit: u32, id: TextureId) -> Result<(), GpuError> {
        self.ensure_alive()?;
        self.backend.bind_texture(unit, id);
        self.check("bind_texture")?;
        self.units.insert(unit, id);
        Ok(())
    }

    pub(crate) fn delete_texture(&mut self, id: TextureId) -> Result<(), GpuError> {
        self.ensure_alive()?;
        self.units.retain(|_, bound| *bound != id);
        self.backend.delete_texture(id);
        self.check("delete_texture")?;
        log::debug!("released {id:?}");
        Ok(())
    }

    // ── framebuffers ──────────────────────────────────────────────────────

    pub(crate) fn create_framebuffer(
        &mut self,
        texture: TextureId,
    ) -> Result<FramebufferId, GpuError> {
        self.ensure_alive()?;
        let id = FramebufferId(self.alloc_id());
        self.backend.create_framebuffer(id, texture);
        self.check("create_framebuffer")?;
        Ok(id)
    }

    pub(crate) fn bind_framebuffer(&mut self, id: Option<FramebufferId>) -> Result<(), GpuError> {
        self.ensure_alive()?;
        self.backend.bind_framebuffer(id);
        self.check("bind_framebuffer")?;
        self.target = id.map_or(RenderTarget::Window, RenderTarget::Framebuffer);
        Ok(())
    }

    pub(crate) fn delete_framebuffer(&mut self, id: FramebufferId) -> Result<(), GpuError> {
        self.ensure_alive()?;
        if self.target == RenderTarget::Framebuffer(id) {
            self.backend.bind_framebuffer(None);
            self.target = RenderTarget::Window;
        }
        self.backend.delete_framebuffer(id);
        self.check("delete_framebuffer")
    }

    // ── surfaces ──────────────────────────────────────────────────────────

    pub(crate) fn create_surface(
        &mut self,
        window: &PlatformWindow,
        size: Size,
    ) -> Result<SurfaceId, GpuError> {
        self.ensure_alive()?;
        let id = SurfaceId(self.alloc_id());
        self.backend.create_surface(id, window, size);
        self.check("create_surface")?;
        self.presented.insert(id, 0);
        Ok(id)
    }

    pub(crate) fn resize_surface(&mut self, id: SurfaceId, size: Size) -> Result<(), GpuError> {
        self.ensure_alive()?;
        self.backend.resize_surface(id, size);
        self.check("resize_surface")
    }

    /// Makes `id` the surface subsequent window-targeted work applies to.
    pub(crate) fn make_current(&mut self, id: SurfaceId) -> Result<(), GpuError> {
        self.ensure_alive()?;
        self.backend.make_current(id);
        self.check("make_current")?;
        self.current = Some(id);
        Ok(())
    }

    pub(crate) fn blit(&mut self, surface: SurfaceId, texture: TextureId) -> Result<(), GpuError> {
        self.ensure_alive()?;
        self.backend.blit(surface, texture);
        self.check("blit")
    }

    pub(crate) fn present(&mut self, surface: SurfaceId) -> Result<(), GpuError> {
        self.ensure_alive()?;
        self.backend.present(surface);
        self.check("present")?;
        *self.presented.entry(surface).or_insert(0) += 1;
        Ok(())
    }

    pub(crate) fn destroy_surface(&mut self, id: SurfaceId) -> Result<(), GpuError> {
        self.ensure_alive()?;
        if self.current == Some(id) {
            self.current = None;
        }
        self.presented.remove(&id);
        self.backend.destroy_surface(id);
        self.check("destroy_surface")
    }

    // ── error hook ────────────────────────────────────────────────────────

    /// Post-call check. Any recorded backend failure marks this `Gpu` lost.
    fn check(&mut self, op: &'static str) -> Result<(), GpuError> {
        match self.backend.take_error() {
            None => Ok(()),
            Some(message) => Err(self.fail(op, message)),
        }
    }

    fn fail(&mut self, op: &'static str, message: impl Into<String>) -> GpuError {
        let err = GpuError { op, message: message.into() };
        log::error!("{err}; GPU state is no longer trusted");
        self.lost = Some(err.clone());
        err
    }

    fn ensure_alive(&self) -> Result<(), GpuError> {
        match &self.lost {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}
