//! Per-window wgpu surface state.
//!
//! A surface remembers the client size it was last given even when that
//! size cannot be configured. wgpu rejects a 0x0 configuration, which is
//! what a minimized window reports, so an empty size is only recorded and
//! frames are skipped until a non-empty resize configures the surface again.

use crate::coords::Size;
use crate::window::PlatformWindow;

use super::{GpuInit, SurfaceErrorAction, SurfaceId};

/// A configured window surface plus the frame acquired for the next present.
pub(super) struct WindowSurface {
    pub(super) window: PlatformWindow,
    pub(super) surface: wgpu::Surface<'static>,
    pub(super) config: wgpu::SurfaceConfiguration,
    pub(super) size: Size,
    pub(super) frame: Option<wgpu::SurfaceTexture>,
}

impl WindowSurface {
    /// Configures `surface` unless `size` is empty.
    pub(super) fn new(
        device: &wgpu::Device,
        window: PlatformWindow,
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
        size: Size,
    ) -> Self {
        if !size.is_empty() {
            surface.configure(device, &config);
        }
        Self {
            window,
            surface,
            config,
            size,
            frame: None,
        }
    }

    /// Tracks a new client size. Any frame acquired at the old size is
    /// dropped, since it cannot be presented after a reconfigure.
    pub(super) fn resize(&mut self, device: &wgpu::Device, size: Size) {
        self.frame = None;
        self.size = size;
        if size.is_empty() {
            return;
        }
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(device, &self.config);
    }

    /// Makes sure a frame is held for the next present.
    ///
    /// `Ok(false)` means skip this frame. A stale surface is reconfigured
    /// and retried once.
    pub(super) fn acquire(&mut self, device: &wgpu::Device, id: SurfaceId) -> Result<bool, String> {
        if self.frame.is_some() {
            return Ok(true);
        }
        if self.size.is_empty() {
            return Ok(false);
        }

        for _ in 0..2 {
            let err = match self.surface.get_current_texture() {
                Ok(frame) => {
                    self.frame = Some(frame);
                    return Ok(true);
                }
                Err(err) => err,
            };
            match recovery_for(&err) {
                SurfaceErrorAction::Reconfigured => {
                    self.surface.configure(device, &self.config);
                }
                SurfaceErrorAction::SkipFrame => {
                    log::debug!("{id:?}: surface busy ({err}); frame skipped");
                    return Ok(false);
                }
                SurfaceErrorAction::Fatal => return Err(format!("{id:?}: {err}")),
            }
        }
        Ok(false)
    }
}

/// Builds the configuration for a freshly created surface, or `None` when
/// the adapter offers no format for it.
pub(super) fn surface_config(
    caps: &wgpu::SurfaceCapabilities,
    init: &GpuInit,
    size: Size,
) -> Option<wgpu::SurfaceConfiguration> {
    let format = pick_format(&caps.formats, init.prefer_srgb)?;
    Some(wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode: init.present_mode,
        alpha_mode: pick_alpha_mode(&caps.alpha_modes, init.alpha_mode),
        view_formats: vec![],
        desired_maximum_frame_latency: init.desired_maximum_frame_latency,
    })
}

fn pick_format(formats: &[wgpu::TextureFormat], prefer_srgb: bool) -> Option<wgpu::TextureFormat> {
    const SRGB: [wgpu::TextureFormat; 2] = [
        wgpu::TextureFormat::Bgra8UnormSrgb,
        wgpu::TextureFormat::Rgba8UnormSrgb,
    ];
    prefer_srgb
        .then(|| SRGB.into_iter().find(|f| formats.contains(f)))
        .flatten()
        .or_else(|| formats.first().copied())
}

fn pick_alpha_mode(
    supported: &[wgpu::CompositeAlphaMode],
    requested: Option<wgpu::CompositeAlphaMode>,
) -> wgpu::CompositeAlphaMode {
    requested
        .filter(|m| supported.contains(m))
        .or_else(|| supported.first().copied())
        .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}

fn recovery_for(err: &wgpu::SurfaceError) -> SurfaceErrorAction {
    match err {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => SurfaceErrorAction::Reconfigured,
        wgpu::SurfaceError::OutOfMemory => SurfaceErrorAction::Fatal,
        wgpu::SurfaceError::Timeout | wgpu::SurfaceError::Other => SurfaceErrorAction::SkipFrame,
    }
}
