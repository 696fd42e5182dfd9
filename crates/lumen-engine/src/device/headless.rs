use std::collections::HashMap;

use image::RgbaImage;

use crate::coords::{Point, Rect, Size};
use crate::paint;
use crate::window::PlatformWindow;

use super::{FramebufferId, GpuBackend, SamplerPolicy, SurfaceId, TextureId};

struct HeadlessSurface {
    back: RgbaImage,
    front: RgbaImage,
}

impl HeadlessSurface {
    fn new(size: Size) -> Self {
        Self {
            back: RgbaImage::new(size.width, size.height),
            front: RgbaImage::new(size.width, size.height),
        }
    }
}

/// In-memory device used for tests and offscreen rendering.
///
/// Mirrors the validation a real device performs on handles and upload
/// regions, so misuse is reported through the same error hook.
#[derive(Default)]
pub struct HeadlessBackend {
    textures: HashMap<TextureId, RgbaImage>,
    framebuffers: HashMap<FramebufferId, TextureId>,
    surfaces: HashMap<SurfaceId, HeadlessSurface>,
    error: Option<String>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(message);
        }
    }
}

impl GpuBackend for HeadlessBackend {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn create_texture(
        &mut self,
        id: TextureId,
        size: Size,
        pixels: Option<&RgbaImage>,
        _sampler: &SamplerPolicy,
    ) {
        let img = match pixels {
            Some(px) if px.dimensions() != (size.width, size.height) => {
                self.record(format!("initial pixels do not match {size:?}"));
                return;
            }
            Some(px) => px.clone(),
            None => RgbaImage::new(size.width, size.height),
        };
        self.textures.insert(id, img);
    }

    fn write_texture(&mut self, id: TextureId, rect: Rect, data: &[u8], bytes_per_row: u32) {
        let Some(tex) = self.textures.get_mut(&id) else {
            self.record(format!("write to unknown {id:?}"));
            return;
        };
        let bounds = Rect::from_size(Size::new(tex.width(), tex.height()));
        if rect.intersect(bounds) != Some(rect) {
            self.record(format!("write region {rect:?} outside {bounds:?}"));
            return;
        }
        let row_len = rect.width() as usize * 4;
        let stride = bytes_per_row as usize;
        let needed = stride * (rect.height() as usize - 1) + row_len;
        if data.len() < needed {
            self.record(format!("upload needs {needed} bytes, got {}", data.len()));
            return;
        }

        let w = tex.width() as usize;
        let raw: &mut [u8] = tex;
        for row in 0..rect.height() as usize {
            let src = &data[row * stride..row * stride + row_len];
            let y = rect.origin.y as usize + row;
            let start = (y * w + rect.origin.x as usize) * 4;
            raw[start..start + row_len].copy_from_slice(src);
        }
    }

    fn bind_texture(&mut self, _unit: u32, id: TextureId) {
        if !self.textures.contains_key(&id) {
            self.record(format!("bind of unknown {id:?}"));
        }
    }

    fn delete_texture(&mut self, id: TextureId) {
        if self.textures.remove(&id).is_none() {
            self.record(format!("delete of unknown {id:?}"));
        }
        self.framebuffers.retain(|_, tex| *tex != id);
    }

    fn read_texture(&mut self, id: TextureId) -> Option<RgbaImage> {
        let img = self.textures.get(&id).cloned();
        if img.is_none() {
            self.record(format!("read of unknown {id:?}"));
        }
        img
    }

    fn create_framebuffer(&mut self, id: FramebufferId, texture: TextureId) {
        if !self.textures.contains_key(&texture) {
            self.record(format!("framebuffer on unknown {texture:?}"));
            return;
        }
        self.framebuffers.insert(id, texture);
    }

    fn bind_framebuffer(&mut self, id: Option<FramebufferId>) {
        if let Some(id) = id {
            if !self.framebuffers.contains_key(&id) {
                self.record(format!("bind of unknown {id:?}"));
            }
        }
    }

    fn delete_framebuffer(&mut self, id: FramebufferId) {
        if self.framebuffers.remove(&id).is_none() {
            self.record(format!("delete of unknown {id:?}"));
        }
    }

    fn create_surface(&mut self, id: SurfaceId, _window: &PlatformWindow, size: Size) {
        self.surfaces.insert(id, HeadlessSurface::new(size));
    }

    fn resize_surface(&mut self, id: SurfaceId, size: Size) {
        match self.surfaces.get_mut(&id) {
            Some(s) => *s = HeadlessSurface::new(size),
            None => self.record(format!("resize of unknown {id:?}")),
        }
    }

    fn make_current(&mut self, id: SurfaceId) {
        if !self.surfaces.contains_key(&id) {
            self.record(format!("make_current on unknown {id:?}"));
        }
    }

    fn blit(&mut self, surface: SurfaceId, texture: TextureId) {
        let Some(src) = self.textures.get(&texture) else {
            self.record(format!("blit of unknown {texture:?}"));
            return;
        };
        let Some(dst) = self.surfaces.get_mut(&surface) else {
            self.record(format!("blit onto unknown {surface:?}"));
            return;
        };
        let src_rect = Rect::from_size(Size::new(src.width(), src.height()));
        paint::copy_region(&mut dst.back, Point::zero(), src, src_rect);
    }

    fn present(&mut self, surface: SurfaceId) {
        match self.surfaces.get_mut(&surface) {
            Some(s) => s.front = s.back.clone(),
            None => self.record(format!("present of unknown {surface:?}")),
        }
    }

    fn destroy_surface(&mut self, id: SurfaceId) {
        if self.surfaces.remove(&id).is_none() {
            self.record(format!("destroy of unknown {id:?}"));
        }
    }

    fn read_surface(&mut self, id: SurfaceId) -> Option<RgbaImage> {
        self.surfaces.get(&id).map(|s| s.front.clone())
    }

    fn take_error(&mut self) -> Option<String> {
        self.error.take()
    }
}
