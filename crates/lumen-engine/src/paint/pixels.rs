//! Pixel operations on packed RGBA8 buffers.
//!
//! All operations clip to the destination bounds; out-of-range regions are
//! silently ignored. Blending is straight-alpha source-over in integer math so
//! repeated renders are bit-reproducible.

use image::{Rgba, RgbaImage};

use crate::coords::{Point, Rect, Size};

use super::Color;

#[inline]
fn bounds(img: &RgbaImage) -> Rect {
    Rect::from_size(Size::new(img.width(), img.height()))
}

/// Source-over blend of `src` onto `dst` (both straight alpha).
#[inline]
pub fn blend_pixel(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let sa = src.0[3] as u32;
    if sa == 255 {
        return src;
    }
    if sa == 0 {
        return dst;
    }
    let da = dst.0[3] as u32;

    // Scaled by 255 * 255 to stay in integers.
    let dst_weight = da * (255 - sa);
    let out_a = sa * 255 + dst_weight;
    if out_a == 0 {
        return Rgba([0, 0, 0, 0]);
    }

    let mut out = [0u8; 4];
    for i in 0..3 {
        let c = src.0[i] as u32 * sa * 255 + dst.0[i] as u32 * dst_weight;
        out[i] = ((c + out_a / 2) / out_a) as u8;
    }
    out[3] = ((out_a + 127) / 255) as u8;
    Rgba(out)
}

/// Blends a solid color over `rect ∩ clip ∩ bounds`.
pub fn fill_rect(dst: &mut RgbaImage, rect: Rect, clip: Rect, color: Color) {
    let Some(area) = rect.intersect(clip).and_then(|r| r.intersect(bounds(dst))) else {
        return;
    };
    let src = color.to_pixel();
    for y in area.min().y..area.max().y {
        for x in area.min().x..area.max().x {
            let p = dst.get_pixel_mut(x as u32, y as u32);
            *p = blend_pixel(*p, src);
        }
    }
}

/// Overwrites `rect ∩ bounds` with `color` (no blending).
pub fn clear_rect(dst: &mut RgbaImage, rect: Rect, color: Color) {
    let Some(area) = rect.intersect(bounds(dst)) else {
        return;
    };
    let px = color.to_pixel();
    for y in area.min().y..area.max().y {
        for x in area.min().x..area.max().x {
            dst.put_pixel(x as u32, y as u32, px);
        }
    }
}

/// Blends all of `src` over `dst` with its top-left at `at`, clipped to `clip`.
///
/// `opacity` scales the source alpha.
pub fn blend_image(dst: &mut RgbaImage, src: &RgbaImage, at: Point, clip: Rect, opacity: f32) {
    let placed = bounds(src).translate(at);
    let Some(area) = placed.intersect(clip).and_then(|r| r.intersect(bounds(dst))) else {
        return;
    };
    let scale = opacity.clamp(0.0, 1.0);
    for y in area.min().y..area.max().y {
        for x in area.min().x..area.max().x {
            let mut s = *src.get_pixel((x - at.x) as u32, (y - at.y) as u32);
            if scale < 1.0 {
                s.0[3] = (s.0[3] as f32 * scale).round() as u8;
            }
            let p = dst.get_pixel_mut(x as u32, y as u32);
            *p = blend_pixel(*p, s);
        }
    }
}

/// Copies `src_rect` of `src` into `dst` at `at`, replacing destination pixels.
///
/// Both the source and destination sides are clipped to their buffers.
pub fn copy_region(dst: &mut RgbaImage, at: Point, src: &RgbaImage, src_rect: Rect) {
    let Some(src_rect) = src_rect.intersect(bounds(src)) else {
        return;
    };
    let offset = at - src_rect.origin;
    let Some(area) = src_rect.translate(offset).intersect(bounds(dst)) else {
        return;
    };
    for y in area.min().y..area.max().y {
        for x in area.min().x..area.max().x {
            let s = *src.get_pixel((x - offset.x) as u32, (y - offset.y) as u32);
            dst.put_pixel(x as u32, y as u32, s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    #[test]
    fn opaque_source_replaces() {
        assert_eq!(blend_pixel(BLUE, RED), RED);
    }

    #[test]
    fn transparent_source_keeps_destination() {
        assert_eq!(blend_pixel(BLUE, Rgba([255, 0, 0, 0])), BLUE);
    }

    #[test]
    fn half_alpha_over_opaque_mixes() {
        let out = blend_pixel(BLUE, Rgba([255, 0, 0, 128]));
        assert_eq!(out.0[3], 255);
        assert_eq!(out.0[0], 128);
        assert_eq!(out.0[2], 127);
    }

    #[test]
    fn over_transparent_destination_keeps_source_color() {
        let out = blend_pixel(Rgba([0, 0, 0, 0]), Rgba([200, 100, 50, 64]));
        assert_eq!(out, Rgba([200, 100, 50, 64]));
    }

    #[test]
    fn fill_rect_clips_to_clip_and_bounds() {
        let mut img = RgbaImage::new(4, 4);
        fill_rect(&mut img, Rect::new(-2, -2, 10, 10), Rect::new(1, 1, 2, 2), Color::rgb(255, 0, 0));
        for (x, y, p) in img.enumerate_pixels() {
            let inside = (1..3).contains(&x) && (1..3).contains(&y);
            assert_eq!(*p == RED, inside, "pixel ({x},{y})");
        }
    }

    #[test]
    fn copy_region_clips_source_and_destination() {
        let src = RgbaImage::from_pixel(3, 3, RED);
        let mut dst = RgbaImage::from_pixel(4, 4, BLUE);
        copy_region(&mut dst, Point::new(2, 2), &src, Rect::new(1, 1, 5, 5));
        assert_eq!(*dst.get_pixel(2, 2), RED);
        assert_eq!(*dst.get_pixel(3, 3), RED);
        assert_eq!(*dst.get_pixel(1, 1), BLUE);
    }

    #[test]
    fn copy_region_far_off_destination_is_ignored() {
        let src = RgbaImage::from_pixel(2, 2, RED);
        let mut dst = RgbaImage::from_pixel(4, 4, BLUE);
        copy_region(&mut dst, Point::new(i32::MAX - 1, i32::MAX), &src, Rect::new(0, 0, 2, 2));
        copy_region(&mut dst, Point::new(i32::MIN, i32::MIN), &src, Rect::new(0, 0, 2, 2));
        assert!(dst.pixels().all(|p| *p == BLUE));
    }

    #[test]
    fn blend_image_respects_opacity() {
        let src = RgbaImage::from_pixel(1, 1, RED);
        let mut dst = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0]));
        blend_image(&mut dst, &src, Point::zero(), Rect::new(0, 0, 1, 1), 0.5);
        assert_eq!(*dst.get_pixel(0, 0), Rgba([255, 0, 0, 128]));
    }
}
