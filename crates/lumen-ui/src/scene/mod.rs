//! Viewport tree with incremental re-rendering.
//!
//! A [`Scene`] owns every node in an arena. The root is always a viewport
//! sized to the window it presents to; nested viewports keep their own
//! pixel buffers and are composited into their parent. Each mutation is
//! classified as a [`Change`] and re-renders only what it has to.

mod render;
mod report;
#[cfg(test)]
mod tests;

pub use report::{Change, RenderOutcome, RenderReport};

use image::RgbaImage;

use lumen_engine::coords::{Point, Rect, Size};
use lumen_engine::paint::Color;
use lumen_engine::window::WindowSession;

use crate::error::SceneError;
use crate::node::{Node, NodeId, NodeKind};
use crate::render_state::RenderState;
use crate::style::{ComputedStyle, Style};

type Result<T> = std::result::Result<T, SceneError>;

pub struct Scene {
    nodes: Vec<Node>,
    root: NodeId,
    /// Reused across passes; empty between them.
    state: RenderState,
    session: Option<WindowSession>,
    update_depth: u32,
    pending: bool,
    last_report: RenderReport,
}

impl Scene {
    /// A scene holding only a root viewport of `size`. Nothing is rendered
    /// until the first change or [`render`](Self::render).
    pub fn new(size: Size) -> Self {
        let root = Node::new(NodeKind::viewport(size), Rect::from_size(size), None);
        Self {
            nodes: vec![root],
            root: NodeId(0),
            state: RenderState::new(),
            session: None,
            update_depth: 0,
            pending: false,
            last_report: RenderReport::default(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Presents the root viewport through `session` from now on.
    ///
    /// The root takes the window's size and is rendered and presented in
    /// full.
    pub fn attach(&mut self, session: WindowSession) -> Result<RenderReport> {
        let size = session.size();
        log::debug!("scene attached to window {}", session.id());
        self.session = Some(session);
        self.resize_root(size)
    }

    pub fn detach(&mut self) -> Option<WindowSession> {
        self.session.take()
    }

    pub fn session(&self) -> Option<&WindowSession> {
        self.session.as_ref()
    }

    // ── queries ───────────────────────────────────────────────────────────

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.0 as usize)
            .filter(|n| n.alive)
            .ok_or(SceneError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0 as usize)
            .filter(|n| n.alive)
            .ok_or(SceneError::UnknownNode(id))
    }

    // Unchecked access for ids taken from the tree itself.
    fn n(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    fn n_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(self.node(id)?.children())
    }

    /// Rendered contents of viewport `vp`.
    pub fn pixels(&self, vp: NodeId) -> Result<&RgbaImage> {
        self.node(vp)?
            .viewport_data()
            .map(|d| d.pixels())
            .ok_or(SceneError::NotAViewport(vp))
    }

    /// Parent pixels last captured beneath viewport `vp`.
    pub fn backing(&self, vp: NodeId) -> Result<Option<&RgbaImage>> {
        self.node(vp)?
            .viewport_data()
            .map(|d| d.backing())
            .ok_or(SceneError::NotAViewport(vp))
    }

    /// Nearest viewport strictly above `id`. `None` for the root.
    pub fn enclosing_viewport(&self, id: NodeId) -> Result<Option<NodeId>> {
        self.node(id)?;
        Ok(self.viewport_of(id))
    }

    /// Outcome of the most recent render.
    pub fn last_report(&self) -> &RenderReport {
        &self.last_report
    }

    /// Topmost visible node under `point`, in window coordinates.
    ///
    /// A node is only hit inside the part of its box its ancestors leave
    /// visible. Later siblings win over earlier ones.
    pub fn hit_test(&self, point: Point) -> Option<NodeId> {
        self.hit(self.root, point, None)
    }

    fn hit(&self, id: NodeId, point: Point, clip: Option<Rect>) -> Option<NodeId> {
        let node = self.n(id);
        if !node.computed.visible {
            return None;
        }
        let area = match clip {
            None => node.win_bbox,
            Some(c) => node.win_bbox.intersect(c)?,
        };
        if !area.contains(point) {
            return None;
        }
        node.children
            .iter()
            .rev()
            .find_map(|&c| self.hit(c, point, Some(area)))
            .or(Some(id))
    }

    fn viewport_of(&self, id: NodeId) -> Option<NodeId> {
        let mut cur = self.n(id).parent;
        while let Some(p) = cur {
            if self.n(p).is_viewport() {
                return Some(p);
            }
            cur = self.n(p).parent;
        }
        None
    }

    /// The viewport whose pixels hold `id`'s own content.
    fn content_viewport(&self, id: NodeId) -> NodeId {
        if self.n(id).is_viewport() {
            id
        } else {
            self.viewport_of(id).unwrap_or(self.root)
        }
    }

    /// Part of `id`'s rect left visible by its ancestors, in the enclosing
    /// viewport's space.
    fn visible_area(&self, id: NodeId) -> Option<Rect> {
        let node = self.n(id);
        let Some(vp) = self.viewport_of(id) else {
            return Some(node.rect).filter(|r| !r.is_empty());
        };
        let mut area = node.rect;
        let mut cur = node.parent;
        while let Some(p) = cur {
            if p == vp {
                break;
            }
            area = area.intersect(self.n(p).rect)?;
            cur = self.n(p).parent;
        }
        area.intersect(Rect::from_size(self.n(vp).rect.size))
    }

    // ── mutations ─────────────────────────────────────────────────────────

    /// Appends a node under `parent`, topmost among its siblings.
    ///
    /// `rect` is in the enclosing viewport's space. The render this
    /// triggers is available from [`last_report`](Self::last_report).
    pub fn add_child(&mut self, parent: NodeId, kind: NodeKind, rect: Rect) -> Result<NodeId> {
        self.node(parent)?;

        let mut node = Node::new(kind, rect, Some(parent));
        if let Some(vp) = node.viewport_data_mut() {
            vp.resize(rect.size);
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        self.n_mut(parent).children.push(id);

        self.changed(parent, Change::Structural)?;
        Ok(id)
    }

    pub fn add_viewport(&mut self, parent: NodeId, rect: Rect) -> Result<NodeId> {
        self.add_child(parent, NodeKind::viewport(rect.size), rect)
    }

    /// Removes `id` and its subtree. Their ids become invalid.
    pub fn remove(&mut self, id: NodeId) -> Result<RenderReport> {
        let parent = self.node(id)?.parent.ok_or(SceneError::Root)?;
        self.n_mut(parent).children.retain(|&c| c != id);
        self.release(id);
        self.changed(parent, Change::Structural)
    }

    fn release(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.n_mut(id).children);
        for c in children {
            self.release(c);
        }
        let node = self.n_mut(id);
        node.alive = false;
        node.parent = None;
        // Drops pixel buffers and images.
        node.kind = NodeKind::Frame;
    }

    /// Moves `id` to position `index` among its siblings. Index 0 paints
    /// first; out-of-range indices move it to the top.
    pub fn reorder(&mut self, id: NodeId, index: usize) -> Result<RenderReport> {
        let parent = self.node(id)?.parent.ok_or(SceneError::Root)?;
        let siblings = &mut self.n_mut(parent).children;
        siblings.retain(|&c| c != id);
        let index = index.min(siblings.len());
        siblings.insert(index, id);
        self.changed(parent, Change::Structural)
    }

    /// Moves or resizes `id`. Viewports get fresh buffers when their size
    /// changes. On the root this is a resize.
    pub fn set_rect(&mut self, id: NodeId, rect: Rect) -> Result<RenderReport> {
        let Some(parent) = self.node(id)?.parent else {
            return self.resize_root(rect.size);
        };
        let node = self.n_mut(id);
        node.rect = rect;
        if let Some(vp) = node.viewport_data_mut() {
            vp.resize(rect.size);
        }
        self.changed(parent, Change::Structural)
    }

    /// Resizes viewport `id`, keeping its position. Resizing the root
    /// resizes the attached window as well.
    pub fn resize_viewport(&mut self, id: NodeId, size: Size) -> Result<RenderReport> {
        let node = self.node(id)?;
        if !node.is_viewport() {
            return Err(SceneError::NotAViewport(id));
        }
        match node.parent {
            None => self.resize_root(size),
            Some(_) => {
                let origin = node.rect.origin;
                self.set_rect(id, Rect::from_origin_size(origin, size))
            }
        }
    }

    fn resize_root(&mut self, size: Size) -> Result<RenderReport> {
        let root = self.root;
        let node = self.n_mut(root);
        node.rect = Rect::from_size(size);
        if let Some(vp) = node.viewport_data_mut() {
            vp.resize(size);
        }
        if let Some(session) = &self.session {
            session.resize(size)?;
        }
        self.changed(root, Change::Structural)
    }

    pub fn set_style(&mut self, id: NodeId, style: Style) -> Result<RenderReport> {
        self.node_mut(id)?.style = style;
        self.changed(id, Change::Cosmetic)
    }

    pub fn set_fill(&mut self, id: NodeId, color: Color) -> Result<RenderReport> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Fill(c) => *c = color,
            _ => return Err(SceneError::WrongKind { id, expected: "fill" }),
        }
        self.changed(id, Change::Cosmetic)
    }

    pub fn set_image(&mut self, id: NodeId, image: RgbaImage) -> Result<RenderReport> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Image(img) => *img = image,
            _ => return Err(SceneError::WrongKind { id, expected: "image" }),
        }
        self.changed(id, Change::Cosmetic)
    }

    /// Re-renders after an external change to `id`.
    pub fn notify(&mut self, id: NodeId, change: Change) -> Result<RenderReport> {
        self.node(id)?;
        self.changed(id, change)
    }

    /// Holds back rendering until the matching [`end_update`](Self::end_update).
    /// Calls nest.
    pub fn begin_update(&mut self) {
        self.update_depth += 1;
    }

    /// Closes one [`begin_update`](Self::begin_update). The outermost call
    /// renders everything once if anything changed meanwhile.
    pub fn end_update(&mut self) -> Result<RenderReport> {
        self.update_depth = self.update_depth.saturating_sub(1);
        if self.update_depth == 0 && std::mem::take(&mut self.pending) {
            self.render()
        } else {
            Ok(RenderReport::default())
        }
    }

    /// Renders the whole tree and presents the root.
    pub fn render(&mut self) -> Result<RenderReport> {
        let root = self.root;
        self.layout();
        self.restyle(root);

        let mut report = RenderReport::default();
        if self.render_full(root, &mut report) == RenderOutcome::Rendered {
            let whole = Rect::from_size(self.n(root).rect.size);
            self.propagate(root, whole, &mut report)?;
        }
        self.last_report = report.clone();
        Ok(report)
    }

    fn changed(&mut self, id: NodeId, change: Change) -> Result<RenderReport> {
        if self.update_depth > 0 {
            self.pending = true;
            return Ok(RenderReport::default());
        }
        let report = match change {
            Change::Structural => self.render_structural(id)?,
            Change::Cosmetic => self.render_cosmetic(id)?,
        };
        log::trace!("{change:?} change on {id:?}: {report:?}");
        self.last_report = report.clone();
        Ok(report)
    }

    // ── derived state ─────────────────────────────────────────────────────

    /// Recomputes inherited style for `id` and its subtree.
    fn restyle(&mut self, id: NodeId) {
        let (parent_visible, inherited) = match self.n(id).parent {
            None => (true, 1.0),
            Some(p) => {
                let parent = self.n(p);
                let opacity = if parent.is_viewport() {
                    1.0
                } else {
                    parent.computed.opacity
                };
                (parent.computed.visible, opacity)
            }
        };
        let node = self.n_mut(id);
        node.computed = ComputedStyle::derive(&node.style, parent_visible, inherited);

        for i in 0..self.n(id).children.len() {
            let child = self.n(id).children[i];
            self.restyle(child);
        }
    }

    /// Recomputes window-space boxes for the whole tree.
    fn layout(&mut self) {
        self.place(self.root, Point::zero());
    }

    fn place(&mut self, id: NodeId, origin: Point) {
        let node = self.n_mut(id);
        node.win_bbox = node.rect.translate(origin);
        let inner = if node.is_viewport() {
            node.win_bbox.origin
        } else {
            origin
        };
        for i in 0..self.n(id).children.len() {
            let child = self.n(id).children[i];
            self.place(child, inner);
        }
    }
}
