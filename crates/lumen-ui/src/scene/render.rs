//! Paint passes and change propagation.
//!
//! Every viewport paints into its own buffer. When a viewport is painted
//! into its parent, the parent pixels beneath it are captured as its
//! backing first, so a later change inside the viewport can be shown by
//! restoring the backing and blending the new pixels on top, without
//! repainting anything below it.

use std::mem;

use image::{RgbaImage, imageops};

use lumen_engine::coords::Rect;
use lumen_engine::paint::{self, Color};

use crate::node::{NodeId, NodeKind, ViewportData};
use crate::render_state::RenderState;

use super::{RenderOutcome, RenderReport, Result, Scene};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Mode {
    /// Nested viewports are re-rendered before they are composited.
    Full,
    /// Nested viewports are composited from their current pixels.
    Region,
    /// Nothing is painted until the given viewport, which is restored from
    /// its backing and composited. Later nodes paint as in `Region`.
    Above(NodeId),
}

struct Pass<'r> {
    mode: Mode,
    report: &'r mut RenderReport,
}

impl Scene {
    pub(super) fn render_structural(&mut self, id: NodeId) -> Result<RenderReport> {
        let target = self.content_viewport(id);
        self.layout();
        self.restyle(target);

        let mut report = RenderReport::default();
        if self.render_full(target, &mut report) == RenderOutcome::Rendered {
            let whole = Rect::from_size(self.n(target).rect.size);
            self.propagate(target, whole, &mut report)?;
        }
        Ok(report)
    }

    pub(super) fn render_cosmetic(&mut self, id: NodeId) -> Result<RenderReport> {
        let was_visible = self.n(id).computed.visible;
        self.restyle(id);

        let mut report = RenderReport::default();

        if self.n(id).is_viewport() {
            if !was_visible {
                // Nothing was captured beneath it while hidden.
                if let Some(data) = self.n_mut(id).viewport_data_mut() {
                    data.backing = None;
                }
            }
            report.isolated.push(id);
            if self.render_full(id, &mut report) == RenderOutcome::Rendered {
                let whole = Rect::from_size(self.n(id).rect.size);
                self.propagate(id, whole, &mut report)?;
            }
            return Ok(report);
        }

        let vp = self.content_viewport(id);

        if !self.n(id).kind.supports_isolated_render() {
            report.restyled.push(id);
            if self.render_full(vp, &mut report) == RenderOutcome::Rendered {
                let whole = Rect::from_size(self.n(vp).rect.size);
                self.propagate(vp, whole, &mut report)?;
            }
            return Ok(report);
        }

        report.isolated.push(id);
        let Some(area) = self.visible_area(id) else {
            return Ok(report);
        };
        if self.repaint(vp, Some(area), Mode::Region, &mut report) == RenderOutcome::Rendered {
            self.propagate(vp, area, &mut report)?;
        }
        Ok(report)
    }

    /// Renders viewport `vp` completely, nested viewports included.
    pub(super) fn render_full(&mut self, vp: NodeId, report: &mut RenderReport) -> RenderOutcome {
        self.repaint(vp, None, Mode::Full, report)
    }

    fn repaint(
        &mut self,
        vp: NodeId,
        region: Option<Rect>,
        mode: Mode,
        report: &mut RenderReport,
    ) -> RenderOutcome {
        let mut state = mem::take(&mut self.state);
        let outcome = self.paint_viewport(vp, region, mode, &mut state, report);
        debug_assert_eq!(state.depth(), 0, "clip stack left unbalanced");
        self.state = state;
        outcome
    }

    /// Paints the content of viewport `vp` into its own buffer, limited to
    /// `region` (local space) when given.
    fn paint_viewport(
        &mut self,
        vp: NodeId,
        region: Option<Rect>,
        mode: Mode,
        state: &mut RenderState,
        report: &mut RenderReport,
    ) -> RenderOutcome {
        let node = self.n(vp);
        let size = node.rect.size;
        let Some(mut bounds) = state.push_bounds(Rect::from_size(size)) else {
            log::debug!("viewport {vp:?} has empty bounds; not rendered");
            report.skipped.push(vp);
            return RenderOutcome::Skipped;
        };
        let background = node.computed.background.filter(|_| node.computed.visible);
        let children = node.children.clone();

        let mut pixels = match self.n_mut(vp).viewport_data_mut() {
            Some(data) => mem::take(&mut data.pixels),
            None => return RenderOutcome::Skipped,
        };
        let stale = pixels.dimensions() != (size.width, size.height);
        if stale {
            pixels = RgbaImage::new(size.width, size.height);
        }
        let (region, mode) = match region {
            Some(r) if !stale => (r, mode),
            _ => (bounds.rect(), Mode::Full),
        };

        if let Some(mut clip) = bounds.push_clip(region) {
            let area = clip.rect();
            if !matches!(mode, Mode::Above(_)) {
                paint::clear_rect(&mut pixels, area, Color::TRANSPARENT);
                if let Some(bg) = background {
                    paint::fill_rect(&mut pixels, area, area, bg);
                }
            }

            let mut pass = Pass { mode, report: &mut *report };
            for child in children {
                self.paint_node(child, &mut pixels, &mut clip, &mut pass);
            }
        }
        drop(bounds);

        if let Some(data) = self.n_mut(vp).viewport_data_mut() {
            data.pixels = pixels;
        }
        if mode == Mode::Full {
            report.full.push(vp);
        }
        RenderOutcome::Rendered
    }

    /// Paints `id` and its subtree into `target`, the enclosing viewport's
    /// buffer, within the current clip.
    fn paint_node(
        &mut self,
        id: NodeId,
        target: &mut RgbaImage,
        state: &mut RenderState,
        pass: &mut Pass<'_>,
    ) {
        if pass.mode == Mode::Above(id) {
            pass.mode = Mode::Region;
            if let Some(clip) = state.clip() {
                self.restore_and_composite(id, target, clip, pass.report);
            }
            return;
        }

        let node = self.n(id);
        if !node.computed.visible {
            return;
        }
        let rect = node.rect;
        let computed = node.computed;
        let is_viewport = node.is_viewport();

        let Some(mut clip) = state.push_clip(rect) else {
            if is_viewport && rect.is_empty() {
                log::debug!("viewport {id:?} has empty bounds; not rendered");
                pass.report.skipped.push(id);
            }
            return;
        };
        let area = clip.rect();
        let painting = !matches!(pass.mode, Mode::Above(_));

        if is_viewport {
            if painting {
                self.composite(id, target, &mut clip, pass);
            }
            return;
        }

        if painting {
            if let Some(bg) = computed.background {
                paint::fill_rect(target, rect, area, bg.with_opacity(computed.opacity));
            }
            match &self.n(id).kind {
                NodeKind::Fill(color) => {
                    paint::fill_rect(target, rect, area, color.with_opacity(computed.opacity));
                }
                NodeKind::Image(img) => {
                    paint::blend_image(target, img, rect.origin, area, computed.opacity);
                }
                NodeKind::Frame | NodeKind::Viewport(_) => {}
            }
        }

        let children = self.n(id).children.clone();
        for child in children {
            self.paint_node(child, target, &mut clip, pass);
        }
    }

    /// Blends nested viewport `id` into `target`, capturing what lies
    /// beneath it first.
    fn composite(
        &mut self,
        id: NodeId,
        target: &mut RgbaImage,
        state: &mut RenderState,
        pass: &mut Pass<'_>,
    ) {
        if pass.mode == Mode::Full {
            self.paint_viewport(id, None, Mode::Full, state, pass.report);
        }
        let Some(area) = state.clip() else { return };

        let node = &mut self.nodes[id.0 as usize];
        let (rect, opacity) = (node.rect, node.computed.opacity);
        let Some(data) = node.viewport_data_mut() else { return };

        capture_backing(data, rect, target, area);
        paint::blend_image(target, &data.pixels, rect.origin, area, opacity);
        pass.report.composited.push(id);
    }

    /// Puts back the pixels captured beneath `id` inside `clip`, then
    /// blends its current pixels over them.
    fn restore_and_composite(
        &self,
        id: NodeId,
        target: &mut RgbaImage,
        clip: Rect,
        report: &mut RenderReport,
    ) {
        let node = self.n(id);
        let Some(area) = clip.intersect(node.rect) else { return };
        let Some(data) = node.viewport_data() else { return };
        let Some(backing) = data.backing.as_ref() else { return };

        paint::copy_region(target, area.origin, backing, area.translate(-node.rect.origin));
        paint::blend_image(target, &data.pixels, node.rect.origin, area, node.computed.opacity);
        report.composited.push(id);
    }

    /// Carries a change of `changed` (local to `vp`) up to the root and
    /// presents it.
    pub(super) fn propagate(
        &mut self,
        vp: NodeId,
        changed: Rect,
        report: &mut RenderReport,
    ) -> Result<()> {
        let mut cur = vp;
        let mut changed = changed;

        while let Some(parent) = self.viewport_of(cur) {
            let node = self.n(cur);
            let Some(area) = self
                .visible_area(cur)
                .and_then(|a| a.intersect(changed.translate(node.rect.origin)))
            else {
                return Ok(());
            };

            let has_backing = node.viewport_data().is_some_and(|d| d.backing.is_some());
            let mode = if node.computed.visible && has_backing {
                Mode::Above(cur)
            } else {
                Mode::Region
            };
            if self.repaint(parent, Some(area), mode, report) == RenderOutcome::Skipped {
                return Ok(());
            }

            cur = parent;
            changed = area;
        }

        self.present(changed, report)
    }

    /// Sends `changed` (root space) to the attached window, if any.
    fn present(&self, changed: Rect, report: &mut RenderReport) -> Result<()> {
        let root = self.n(self.root);
        let Some(area) = changed.intersect(Rect::from_size(root.rect.size)) else {
            return Ok(());
        };
        report.dirty = Some(report.dirty.map_or(area, |d| d.union(area)));

        let Some(session) = &self.session else {
            return Ok(());
        };
        if session.is_closed() {
            log::debug!("window {} is closed; not presenting", session.id());
            return Ok(());
        }
        let Some(data) = root.viewport_data() else {
            return Ok(());
        };

        let crop = imageops::crop_imm(
            data.pixels(),
            area.origin.x as u32,
            area.origin.y as u32,
            area.size.width,
            area.size.height,
        )
        .to_image();
        session.upload(area.origin, crop)?;
        session.publish_tex()?;
        report.presented = true;
        Ok(())
    }
}

/// Copies `area` of `target` into `data`'s backing, reallocating the
/// backing when it does not match the viewport's size.
fn capture_backing(data: &mut ViewportData, rect: Rect, target: &RgbaImage, area: Rect) {
    let (w, h) = (rect.size.width, rect.size.height);
    let backing = data.backing.get_or_insert_with(|| RgbaImage::new(w, h));
    if backing.dimensions() != (w, h) {
        *backing = RgbaImage::new(w, h);
    }
    paint::copy_region(backing, area.origin - rect.origin, target, area);
}
