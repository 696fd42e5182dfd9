use std::collections::HashMap;

use anyhow::{Context, Result};
use image::RgbaImage;

use crate::coords::{Rect, Size};
use crate::window::PlatformWindow;

use super::blit::Blitter;
use super::surface::{self, WindowSurface};
use super::{
    FilterMode, FramebufferId, GpuBackend, GpuInit, SamplerPolicy, SurfaceId, TextureId, WrapMode,
};

/// Storage format of every texture: packed 8-bit RGBA, sRGB encoded.
pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: Size,
}

/// wgpu device backend.
///
/// Owns the process-wide Instance/Adapter/Device/Queue. Window surfaces are
/// created per session and share the device.
pub struct WgpuBackend {
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    init: GpuInit,

    textures: HashMap<TextureId, GpuTexture>,
    framebuffers: HashMap<FramebufferId, wgpu::TextureView>,
    surfaces: HashMap<SurfaceId, WindowSurface>,
    sampler: Option<(SamplerPolicy, wgpu::Sampler)>,
    blitter: Blitter,

    error: Option<String>,
}

impl WgpuBackend {
    /// Acquires an adapter and device. Blocks the calling (executor) thread.
    pub fn new(init: GpuInit) -> Result<Self> {
        pollster::block_on(Self::new_async(init))
    }

    async fn new_async(init: GpuInit) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("lumen device"),
                required_features: init.required_features,
                required_limits: init.required_limits.clone(),
                experimental_features: Default::default(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: Default::default(),
            })
            .await
            .context("failed to create wgpu device/queue")?;

        log::info!("wgpu adapter: {}", adapter.get_info().name);

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            init,
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            surfaces: HashMap::new(),
            sampler: None,
            blitter: Blitter::default(),
            error: None,
        })
    }

    fn record(&mut self, message: impl Into<String>) {
        if self.error.is_none() {
            self.error = Some(message.into());
        }
    }

    /// Runs `f` inside out-of-memory + validation error scopes and records what they catch.
    fn scoped<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let oom_scope = self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let validation_scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let out = f(self);
        let validation = pollster::block_on(validation_scope.pop());
        let oom = pollster::block_on(oom_scope.pop());
        if let Some(err) = validation.or(oom) {
            self.record(err.to_string());
        }
        out
    }

    fn ensure_sampler(&mut self, policy: &SamplerPolicy) {
        if self.sampler.as_ref().map(|(p, _)| p) != Some(policy) {
            let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("lumen texture sampler"),
                address_mode_u: address_mode(policy.wrap_u),
                address_mode_v: address_mode(policy.wrap_v),
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: filter_mode(policy.mag_filter),
                min_filter: filter_mode(policy.min_filter),
                mipmap_filter: wgpu::MipmapFilterMode::Nearest,
                ..Default::default()
            });
            self.sampler = Some((*policy, sampler));
        }
    }

    /// Acquires the next surface texture, reconfiguring once on a stale surface.
    fn acquire(&mut self, id: SurfaceId) -> bool {
        let acquired = match self.surfaces.get_mut(&id) {
            Some(ws) => ws.acquire(&self.device, id),
            None => Err(format!("unknown {id:?}")),
        };
        acquired.unwrap_or_else(|message| {
            self.record(message);
            false
        })
    }
}

impl GpuBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn create_texture(
        &mut self,
        id: TextureId,
        size: Size,
        pixels: Option<&RgbaImage>,
        sampler: &SamplerPolicy,
    ) {
        self.ensure_sampler(sampler);
        let tex = self.scoped(|this| {
            // wgpu rejects zero-area textures; keep a 1x1 placeholder instead.
            let extent = extent(Size::new(size.width.max(1), size.height.max(1)));
            let texture = this.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("lumen texture"),
                size: extent,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: TEXTURE_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_DST
                    | wgpu::TextureUsages::COPY_SRC
                    | wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            if let Some(px) = pixels.filter(|_| !size.is_empty()) {
                this.queue.write_texture(
                    wgpu::TexelCopyTextureInfo {
                        texture: &texture,
                        mip_level: 0,
                        origin: wgpu::Origin3d::ZERO,
                        aspect: wgpu::TextureAspect::All,
                    },
                    px.as_raw(),
                    wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(px.width() * 4),
                        rows_per_image: Some(px.height()),
                    },
                    extent,
                );
            }
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            GpuTexture { texture, view, size }
        });
        self.textures.insert(id, tex);
    }

    fn write_texture(&mut self, id: TextureId, rect: Rect, data: &[u8], bytes_per_row: u32) {
        let Some(tex) = self.textures.get(&id) else {
            self.record(format!("write to unknown {id:?}"));
            return;
        };
        let bounds = Rect::from_size(tex.size);
        if rect.intersect(bounds) != Some(rect) {
            self.record(format!("write region {rect:?} outside {bounds:?}"));
            return;
        }
        let texture = tex.texture.clone();
        self.scoped(|this| {
            this.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d {
                        x: rect.origin.x as u32,
                        y: rect.origin.y as u32,
                        z: 0,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                data,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(rect.height()),
                },
                extent(rect.size),
            );
        });
    }

    fn bind_texture(&mut self, _unit: u32, id: TextureId) {
        // Bindings resolve into bind groups at draw time; only the handle is validated here.
        if !self.textures.contains_key(&id) {
            self.record(format!("bind of unknown {id:?}"));
        }
    }

    fn delete_texture(&mut self, id: TextureId) {
        match self.textures.remove(&id) {
            Some(tex) => tex.texture.destroy(),
            None => self.record(format!("delete of unknown {id:?}")),
        }
    }

    fn read_texture(&mut self, id: TextureId) -> Option<RgbaImage> {
        let Some(tex) = self.textures.get(&id) else {
            self.record(format!("read of unknown {id:?}"));
            return None;
        };
        let size = tex.size;
        if size.is_empty() {
            return Some(RgbaImage::new(size.width, size.height));
        }
        let texture = tex.texture.clone();

        let unpadded = size.width * 4;
        let padded = unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lumen readback"),
            size: padded as u64 * size.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lumen readback encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(size.height),
                },
            },
            extent(size),
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            tx.send(result).ok();
        });
        self.device
            .poll(wgpu::PollType::Wait { submission_index: None, timeout: None })
            .ok();

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.record(format!("readback map failed: {e}"));
                return None;
            }
            Err(_) => {
                self.record("readback callback dropped");
                return None;
            }
        }

        let mapped = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity(size.rgba_len());
        for row in mapped.chunks(padded as usize) {
            pixels.extend_from_slice(&row[..unpadded as usize]);
        }
        drop(mapped);
        staging.unmap();

        RgbaImage::from_raw(size.width, size.height, pixels)
    }

    fn create_framebuffer(&mut self, id: FramebufferId, texture: TextureId) {
        let Some(tex) = self.textures.get(&texture) else {
            self.record(format!("framebuffer on unknown {texture:?}"));
            return;
        };
        let view = tex.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("lumen framebuffer"),
            ..Default::default()
        });
        self.framebuffers.insert(id, view);
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

    fn create_surface(&mut self, id: SurfaceId, window: &PlatformWindow, size: Size) {
        let Some(target) = window.surface_target() else {
            self.record("window has no native surface");
            return;
        };
        let surface = match self.instance.create_surface(target) {
            Ok(s) => s,
            Err(e) => {
                self.record(format!("failed to create surface: {e}"));
                return;
            }
        };

        let caps = surface.get_capabilities(&self.adapter);
        let Some(config) = surface::surface_config(&caps, &self.init, size) else {
            self.record("no supported surface formats");
            return;
        };
        let format = config.format;

        self.scoped(|this| {
            let ws = WindowSurface::new(&this.device, window.clone(), surface, config, size);
            this.surfaces.insert(id, ws);
        });
        log::debug!("{id:?} configured as {format:?}");
    }

    fn resize_surface(&mut self, id: SurfaceId, size: Size) {
        let Some(ws) = self.surfaces.get_mut(&id) else {
            self.record(format!("resize of unknown {id:?}"));
            return;
        };
        ws.resize(&self.device, size);
    }

    fn make_current(&mut self, id: SurfaceId) {
        if !self.surfaces.contains_key(&id) {
            self.record(format!("make_current on unknown {id:?}"));
        }
    }

    fn blit(&mut self, surface: SurfaceId, texture: TextureId) {
        if !self.acquire(surface) {
            return;
        }
        if !self.textures.contains_key(&texture) {
            self.record(format!("blit of unknown {texture:?}"));
            return;
        }
        let (Some(tex), Some((_, sampler)), Some(ws)) = (
            self.textures.get(&texture),
            self.sampler.as_ref(),
            self.surfaces.get(&surface),
        ) else {
            return;
        };
        let Some(frame) = ws.frame.as_ref() else { return };

        let target = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lumen blit encoder"),
            });
        self.blitter.draw(
            &self.device,
            &mut encoder,
            ws.config.format,
            &target,
            ws.size,
            &tex.view,
            tex.size,
            sampler,
        );
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn present(&mut self, surface: SurfaceId) {
        let had_frame = self
            .surfaces
            .get(&surface)
            .is_some_and(|ws| ws.frame.is_some());

        if !had_frame {
            if !self.acquire(surface) {
                return;
            }
            // Nothing was drawn this frame: present a cleared surface.
            if let Some(frame) = self.surfaces.get(&surface).and_then(|ws| ws.frame.as_ref()) {
                let view = frame
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                let mut encoder = self
                    .device
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("lumen clear encoder"),
                    });
                {
                    let _rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("lumen clear"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: &view,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                                store: wgpu::StoreOp::Store,
                            },
                            depth_slice: None,
                        })],
                        depth_stencil_attachment: None,
                        timestamp_writes: None,
                        occlusion_query_set: None,
                        multiview_mask: None,
                    });
                }
                self.queue.submit(std::iter::once(encoder.finish()));
            }
        }

        let Some(ws) = self.surfaces.get_mut(&surface) else { return };
        if let Some(frame) = ws.frame.take() {
            ws.window.pre_present_notify();
            frame.present();
        }
    }

    fn destroy_surface(&mut self, id: SurfaceId) {
        match self.surfaces.remove(&id) {
            Some(mut ws) => drop(ws.frame.take()),
            None => self.record(format!("destroy of unknown {id:?}")),
        }
    }

    fn take_error(&mut self) -> Option<String> {
        self.error.take()
    }
}

fn extent(size: Size) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: size.width,
        height: size.height,
        depth_or_array_layers: 1,
    }
}

fn filter_mode(f: FilterMode) -> wgpu::FilterMode {
    match f {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

fn address_mode(w: WrapMode) -> wgpu::AddressMode {
    match w {
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::MirrorRepeat => wgpu::AddressMode::MirrorRepeat,
    }
}
