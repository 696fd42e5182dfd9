use std::path::Path;

use image::{DynamicImage, RgbaImage};

use crate::coords::{Point, Rect, Size};
use crate::device::{FramebufferId, Gpu, TextureId};
use crate::paint;

use super::TextureError;

/// Converts any decoded image to packed 8-bit RGBA with a `width * 4` stride.
pub fn normalize_rgba(img: &DynamicImage) -> Result<RgbaImage, TextureError> {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let len = rgba.as_raw().len();
    if len != Size::new(width, height).rgba_len() {
        return Err(TextureError::Format { width, height, len });
    }
    Ok(rgba)
}

/// A 2D RGBA texture.
///
/// GPU storage is allocated lazily on the first [`activate`](Self::activate).
/// The handle is only meaningful between activation and [`delete`](Self::delete).
/// An attached framebuffer, when requested, lives and dies with the storage.
#[derive(Debug, Default)]
pub struct Texture {
    size: Size,
    image: Option<RgbaImage>,
    handle: Option<TextureId>,
    unit: u32,
    framebuffer: Option<FramebufferId>,
}

impl Texture {
    /// An empty texture of `size`. Its pixels are zeroed once allocated.
    pub fn new(size: Size) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    /// A texture holding `image` as its CPU mirror; nothing is uploaded yet.
    pub fn from_image(image: RgbaImage) -> Self {
        let (w, h) = image.dimensions();
        Self {
            size: Size::new(w, h),
            image: Some(image),
            ..Self::default()
        }
    }

    /// Decodes an image file into a not-yet-resident texture.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TextureError> {
        let img = decode(path.as_ref())?;
        Ok(Self::from_image(normalize_rgba(&img)?))
    }

    /// Decodes an image file and replaces this texture's contents with it.
    pub fn open(&mut self, gpu: &mut Gpu, path: impl AsRef<Path>) -> Result<(), TextureError> {
        let img = decode(path.as_ref())?;
        self.set_image(gpu, &img)
    }

    /// Replaces the contents with `img`. Resident storage is released and
    /// reallocated at the new size on the same unit.
    pub fn set_image(&mut self, gpu: &mut Gpu, img: &DynamicImage) -> Result<(), TextureError> {
        let rgba = normalize_rgba(img)?;
        let was_active = self.is_active();
        self.delete(gpu)?;

        let (w, h) = rgba.dimensions();
        self.size = Size::new(w, h);
        self.image = Some(rgba);

        if was_active {
            self.activate(gpu, self.unit)?;
        }
        Ok(())
    }

    /// Copies `src_rect` of `src` so that its top-left lands at `offset`.
    ///
    /// The copied region is clipped against both images. Nothing left after
    /// clipping is not an error. Activates the texture on unit 0 first when it
    /// is not resident.
    pub fn set_sub_image(
        &mut self,
        gpu: &mut Gpu,
        offset: Point,
        src: &RgbaImage,
        src_rect: Rect,
    ) -> Result<(), TextureError> {
        let src_bounds = Rect::from_size(Size::new(src.width(), src.height()));
        let Some(src_rect) = src_rect.intersect(src_bounds) else {
            return Ok(());
        };
        let Some(dest) = src_rect
            .translate(offset)
            .intersect(Rect::from_size(self.size))
        else {
            return Ok(());
        };

        if !self.is_active() {
            self.activate(gpu, 0)?;
        }
        let Some(id) = self.handle else {
            return Ok(());
        };

        // Top-left of the surviving region in source coordinates.
        let from = dest.origin - offset;
        let stride = src.width() as usize * 4;
        let raw = src.as_raw();

        if dest.width() == src.width() {
            let start = from.y as usize * stride;
            let end = start + dest.height() as usize * stride;
            gpu.write_texture(id, dest, &raw[start..end], stride as u32)?;
        } else {
            let row_len = dest.width() as usize * 4;
            for row in 0..dest.height() {
                let start = (from.y as usize + row as usize) * stride + from.x as usize * 4;
                let line = Rect::new(dest.origin.x, dest.origin.y + row as i32, dest.width(), 1);
                gpu.write_texture(id, line, &raw[start..start + row_len], row_len as u32)?;
            }
        }

        if let Some(mirror) = self.image.as_mut() {
            paint::copy_region(mirror, dest.origin, src, Rect::from_origin_size(from, dest.size));
        }
        Ok(())
    }

    /// Allocates storage on first use, then binds to `unit`.
    pub fn activate(&mut self, gpu: &mut Gpu, unit: u32) -> Result<(), TextureError> {
        let id = match self.handle {
            Some(id) => id,
            None => {
                let id = gpu.create_texture(self.size, self.image.as_ref())?;
                self.handle = Some(id);
                id
            }
        };
        gpu.bind_texture(unit, id)?;
        self.unit = unit;
        Ok(())
    }

    /// Changes the logical size. Contents are dropped; callers repaint.
    pub fn set_size(&mut self, gpu: &mut Gpu, size: Size) -> Result<(), TextureError> {
        if size == self.size {
            return Ok(());
        }
        let was_active = self.is_active();
        self.delete(gpu)?;
        self.image = None;
        self.size = size;
        if was_active {
            self.activate(gpu, self.unit)?;
        }
        Ok(())
    }

    /// Releases GPU storage and any framebuffer. Safe to call repeatedly.
    pub fn delete(&mut self, gpu: &mut Gpu) -> Result<(), TextureError> {
        self.delete_framebuffer(gpu)?;
        if let Some(id) = self.handle.take() {
            gpu.delete_texture(id)?;
        }
        Ok(())
    }

    // ── off-screen target ─────────────────────────────────────────────────

    /// Routes subsequent draws into this texture. Allocates on first use.
    pub fn activate_framebuffer(&mut self, gpu: &mut Gpu) -> Result<(), TextureError> {
        if !self.is_active() {
            self.activate(gpu, 0)?;
        }
        let fb = match (self.framebuffer, self.handle) {
            (Some(fb), _) => fb,
            (None, Some(id)) => {
                let fb = gpu.create_framebuffer(id)?;
                self.framebuffer = Some(fb);
                fb
            }
            (None, None) => return Ok(()),
        };
        gpu.bind_framebuffer(Some(fb))?;
        Ok(())
    }

    /// Restores the window as the render target.
    pub fn deactivate_framebuffer(&mut self, gpu: &mut Gpu) -> Result<(), TextureError> {
        gpu.bind_framebuffer(None)?;
        Ok(())
    }

    pub fn delete_framebuffer(&mut self, gpu: &mut Gpu) -> Result<(), TextureError> {
        if let Some(fb) = self.framebuffer.take() {
            gpu.delete_framebuffer(fb)?;
        }
        Ok(())
    }

    // ── queries ───────────────────────────────────────────────────────────

    /// Current pixels: read from the device when resident, otherwise the CPU
    /// mirror or a blank image of the logical size.
    pub fn read_back(&self, gpu: &mut Gpu) -> Result<RgbaImage, TextureError> {
        match self.handle {
            Some(id) => Ok(gpu.read_texture(id)?),
            None => Ok(self
                .image
                .clone()
                .unwrap_or_else(|| RgbaImage::new(self.size.width, self.size.height))),
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// CPU mirror, if one is held. Dropped by [`set_size`](Self::set_size).
    pub fn image(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }

    pub fn handle(&self) -> Option<TextureId> {
        self.handle
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    pub fn framebuffer(&self) -> Option<FramebufferId> {
        self.framebuffer
    }
}

fn decode(path: &Path) -> Result<DynamicImage, TextureError> {
    image::open(path).map_err(|e| match e {
        image::ImageError::IoError(source) => TextureError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => TextureError::Decode(other),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{HeadlessBackend, RenderTarget, SamplerPolicy};
    use image::{GrayImage, Luma, Rgb, RgbImage, Rgba};

    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn gpu() -> Gpu {
        Gpu::new(Box::new(HeadlessBackend::new()), SamplerPolicy::default())
    }

    /// Source image whose pixels encode their own coordinates.
    fn coords_image(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| Rgba([x as u8, y as u8, 7, 255]))
    }

    #[test]
    fn red_patch_lands_only_in_target_square() {
        let mut gpu = gpu();
        let mut tex = Texture::from_image(RgbaImage::from_pixel(4, 4, BLACK));
        let red = RgbaImage::from_pixel(2, 2, RED);

        tex.set_sub_image(&mut gpu, Point::new(1, 1), &red, Rect::new(0, 0, 2, 2))
            .unwrap();

        let img = tex.read_back(&mut gpu).unwrap();
        for (x, y, px) in img.enumerate_pixels() {
            let inside = (1..=2).contains(&x) && (1..=2).contains(&y);
            assert_eq!(*px, if inside { RED } else { BLACK }, "pixel ({x},{y})");
        }
        assert_eq!(tex.image(), Some(&img));
        assert_eq!(gpu.bound_texture(0), tex.handle());
    }

    #[test]
    fn set_size_to_current_size_keeps_storage_and_pixels() {
        let mut gpu = gpu();
        let mut tex = Texture::from_image(coords_image(3, 3));
        tex.activate(&mut gpu, 2).unwrap();
        let handle = tex.handle();

        tex.set_size(&mut gpu, Size::new(3, 3)).unwrap();

        assert_eq!(tex.handle(), handle);
        assert_eq!(tex.image(), Some(&coords_image(3, 3)));
    }

    #[test]
    fn set_size_reallocates_blank_on_same_unit() {
        let mut gpu = gpu();
        let mut tex = Texture::from_image(coords_image(8, 6));
        tex.activate(&mut gpu, 1).unwrap();
        let old = tex.handle();

        tex.set_size(&mut gpu, Size::new(4, 3)).unwrap();

        assert!(tex.is_active());
        assert_ne!(tex.handle(), old);
        assert_eq!(gpu.bound_texture(1), tex.handle());
        assert!(tex.image().is_none());
        let img = tex.read_back(&mut gpu).unwrap();
        assert_eq!(img.dimensions(), (4, 3));
        assert!(img.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn delete_twice_is_a_no_op() {
        let mut gpu = gpu();
        let mut tex = Texture::new(Size::new(2, 2));
        tex.activate(&mut gpu, 0).unwrap();

        tex.delete(&mut gpu).unwrap();
        assert!(!tex.is_active());
        tex.delete(&mut gpu).unwrap();
        assert!(!tex.is_active());
        assert!(!gpu.is_lost());
    }

    #[test]
    fn activate_twice_only_rebinds() {
        let mut gpu = gpu();
        let mut tex = Texture::new(Size::new(2, 2));
        tex.activate(&mut gpu, 0).unwrap();
        let first = tex.handle();
        tex.activate(&mut gpu, 4).unwrap();

        assert_eq!(tex.handle(), first);
        assert_eq!(gpu.bound_texture(4), first);
    }

    #[test]
    fn set_image_round_trips_any_pixel_format() {
        let mut gpu = gpu();
        let sources = [
            DynamicImage::ImageLuma8(GrayImage::from_fn(5, 3, |x, y| Luma([(x * 40 + y) as u8]))),
            DynamicImage::ImageRgb8(RgbImage::from_fn(3, 5, |x, y| Rgb([x as u8, y as u8, 200]))),
            DynamicImage::ImageRgba8(coords_image(4, 4)),
        ];

        for src in sources {
            let mut tex = Texture::default();
            tex.set_image(&mut gpu, &src).unwrap();
            tex.activate(&mut gpu, 0).unwrap();
            assert_eq!(tex.read_back(&mut gpu).unwrap(), src.to_rgba8());
        }
    }

    #[test]
    fn set_image_on_resident_texture_replaces_storage() {
        let mut gpu = gpu();
        let mut tex = Texture::new(Size::new(2, 2));
        tex.activate(&mut gpu, 3).unwrap();
        let old = tex.handle();

        let img = DynamicImage::ImageRgba8(coords_image(6, 2));
        tex.set_image(&mut gpu, &img).unwrap();

        assert_ne!(tex.handle(), old);
        assert_eq!(gpu.bound_texture(3), tex.handle());
        assert_eq!(tex.size(), Size::new(6, 2));
        assert_eq!(tex.read_back(&mut gpu).unwrap(), coords_image(6, 2));
    }

    #[test]
    fn sub_image_is_clipped_on_both_sides() {
        let mut gpu = gpu();
        let base = RgbaImage::from_pixel(6, 6, BLACK);
        let src = coords_image(5, 5);

        // Source rect spills past the source, offset pushes it past the texture.
        let cases = [
            (Point::new(-2, -1), Rect::new(1, 1, 10, 10)),
            (Point::new(4, 3), Rect::new(0, 0, 5, 5)),
            (Point::new(0, 0), Rect::new(-3, 2, 4, 2)),
        ];

        for (offset, src_rect) in cases {
            let mut tex = Texture::from_image(base.clone());
            tex.set_sub_image(&mut gpu, offset, &src, src_rect).unwrap();

            let src_rect = src_rect
                .intersect(Rect::new(0, 0, 5, 5))
                .unwrap();
            let dest = src_rect.translate(offset).intersect(Rect::new(0, 0, 6, 6));
            let img = tex.read_back(&mut gpu).unwrap();
            for (x, y, px) in img.enumerate_pixels() {
                let p = Point::new(x as i32, y as i32);
                match dest {
                    Some(d) if d.contains(p) => {
                        let s = p - offset;
                        assert_eq!(*px, *src.get_pixel(s.x as u32, s.y as u32));
                    }
                    _ => assert_eq!(*px, BLACK, "pixel ({x},{y}) changed"),
                }
            }
        }
    }

    #[test]
    fn empty_sub_region_is_silently_ignored() {
        let mut gpu = gpu();
        let mut tex = Texture::new(Size::new(4, 4));
        let src = coords_image(2, 2);

        tex.set_sub_image(&mut gpu, Point::new(10, 10), &src, Rect::new(0, 0, 2, 2))
            .unwrap();
        tex.set_sub_image(&mut gpu, Point::zero(), &src, Rect::new(0, 0, 0, 2))
            .unwrap();

        assert!(!tex.is_active());
        assert!(!gpu.is_lost());
    }

    #[test]
    fn offsets_at_the_edge_of_the_coordinate_range_change_nothing() {
        let mut gpu = gpu();
        let base = RgbaImage::from_pixel(4, 4, BLACK);
        let src = coords_image(2, 2);

        for offset in [
            Point::new(i32::MAX - 1, 0),
            Point::new(0, i32::MAX),
            Point::new(i32::MIN, i32::MIN + 1),
            Point::new(i32::MAX, i32::MIN),
        ] {
            let mut tex = Texture::from_image(base.clone());
            tex.set_sub_image(&mut gpu, offset, &src, Rect::new(0, 0, 2, 2))
                .unwrap();
            assert_eq!(tex.read_back(&mut gpu).unwrap(), base, "offset {offset:?}");
        }
        assert!(!gpu.is_lost());
    }

    #[test]
    fn framebuffer_follows_texture_lifetime() {
        let mut gpu = gpu();
        let mut tex = Texture::new(Size::new(4, 4));

        tex.activate_framebuffer(&mut gpu).unwrap();
        let fb = tex.framebuffer().unwrap();
        assert!(tex.is_active());
        assert_eq!(gpu.render_target(), RenderTarget::Framebuffer(fb));

        tex.deactivate_framebuffer(&mut gpu).unwrap();
        assert_eq!(gpu.render_target(), RenderTarget::Window);

        tex.activate_framebuffer(&mut gpu).unwrap();
        assert_eq!(tex.framebuffer(), Some(fb));

        tex.delete(&mut gpu).unwrap();
        assert!(tex.framebuffer().is_none());
        assert_eq!(gpu.render_target(), RenderTarget::Window);
    }

    #[test]
    fn open_replaces_a_resident_texture_with_the_file_contents() {
        let path = std::env::temp_dir().join(format!("lumen-open-{}.png", std::process::id()));
        coords_image(5, 3).save(&path).unwrap();

        let mut gpu = gpu();
        let mut tex = Texture::from_image(RgbaImage::from_pixel(2, 2, RED));
        tex.activate(&mut gpu, 1).unwrap();
        let old = tex.handle();

        let opened = tex.open(&mut gpu, &path);
        let loaded = Texture::load(&path);
        std::fs::remove_file(&path).ok();
        opened.unwrap();

        assert_ne!(tex.handle(), old);
        assert_eq!(gpu.bound_texture(1), tex.handle());
        assert_eq!(tex.size(), Size::new(5, 3));
        assert_eq!(tex.read_back(&mut gpu).unwrap(), coords_image(5, 3));

        let loaded = loaded.unwrap();
        assert!(!loaded.is_active());
        assert_eq!(loaded.image(), Some(&coords_image(5, 3)));
    }

    #[test]
    fn load_reports_io_and_decode_failures() {
        let missing = std::env::temp_dir().join("lumen-missing-texture.png");
        assert!(matches!(
            Texture::load(&missing),
            Err(TextureError::Io { .. })
        ));

        let garbage = std::env::temp_dir().join("lumen-garbage-texture.png");
        std::fs::write(&garbage, b"definitely not a png").unwrap();
        let res = Texture::load(&garbage);
        std::fs::remove_file(&garbage).ok();
        assert!(matches!(res, Err(TextureError::Decode(_))));
    }
}
