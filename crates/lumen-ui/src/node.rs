use image::{DynamicImage, RgbaImage};

use lumen_engine::coords::{Rect, Size};
use lumen_engine::paint::Color;
use lumen_engine::texture::{TextureError, normalize_rgba};

use crate::style::{ComputedStyle, Style};

/// Arena index of a node. Stale ids are rejected, never reused for a
/// different node within one scene.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct NodeId(pub(crate) u32);

/// What a node draws, and how it may be re-rendered.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Grouping container. Paints only its background and clips its children.
    Frame,
    /// Solid rectangle.
    Fill(Color),
    /// Image drawn at the node's top-left, clipped to its rect.
    Image(RgbaImage),
    /// Nested viewport with its own pixel buffer and coordinate space.
    Viewport(ViewportData),
}

impl NodeKind {
    /// Whether a cosmetic change to this node can be repainted on its own.
    ///
    /// Frames group children whose appearance they influence, so a change to
    /// one restyles its subtree and re-renders the whole viewport instead.
    pub fn supports_isolated_render(&self) -> bool {
        match self {
            NodeKind::Frame => false,
            NodeKind::Fill(_) | NodeKind::Image(_) | NodeKind::Viewport(_) => true,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Frame => "frame",
            NodeKind::Fill(_) => "fill",
            NodeKind::Image(_) => "image",
            NodeKind::Viewport(_) => "viewport",
        }
    }

    pub fn viewport(size: Size) -> Self {
        NodeKind::Viewport(ViewportData::new(size))
    }

    /// Image node from any decoded image, in the same packed RGBA layout
    /// textures upload.
    pub fn image(img: &DynamicImage) -> Result<Self, TextureError> {
        Ok(NodeKind::Image(normalize_rgba(img)?))
    }
}

/// Buffers owned by a viewport node.
#[derive(Debug, Clone)]
pub struct ViewportData {
    /// Rendered content, sized to the viewport.
    pub(crate) pixels: RgbaImage,
    /// Parent pixels beneath this viewport, captured while the parent last
    /// painted it. Never set on the root.
    pub(crate) backing: Option<RgbaImage>,
}

impl ViewportData {
    pub fn new(size: Size) -> Self {
        Self {
            pixels: RgbaImage::new(size.width, size.height),
            backing: None,
        }
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn backing(&self) -> Option<&RgbaImage> {
        self.backing.as_ref()
    }

    /// Reallocates blank buffers when the size changed.
    pub(crate) fn resize(&mut self, size: Size) {
        if self.pixels.dimensions() != (size.width, size.height) {
            self.pixels = RgbaImage::new(size.width, size.height);
            self.backing = None;
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) style: Style,
    pub(crate) computed: ComputedStyle,
    /// Placement in the enclosing viewport's local space.
    pub(crate) rect: Rect,
    /// Placement in window space, for hit testing.
    pub(crate) win_bbox: Rect,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Cleared on removal; the slot stays so ids are never reused.
    pub(crate) alive: bool,
}

impl Node {
    pub(crate) fn new(kind: NodeKind, rect: Rect, parent: Option<NodeId>) -> Self {
        Self {
            kind,
            style: Style::default(),
            computed: ComputedStyle::default(),
            rect,
            win_bbox: rect,
            parent,
            children: Vec::new(),
            alive: true,
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn style(&self) -> &Style {
        &self.style
    }

    pub fn computed_style(&self) -> &ComputedStyle {
        &self.computed
    }

    /// View-relative box: position inside the enclosing viewport.
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Window-relative box.
    pub fn win_bbox(&self) -> Rect {
        self.win_bbox
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_viewport(&self) -> bool {
        matches!(self.kind, NodeKind::Viewport(_))
    }

    pub(crate) fn viewport_data(&self) -> Option<&ViewportData> {
        match &self.kind {
            NodeKind::Viewport(vp) => Some(vp),
            _ => None,
        }
    }

    pub(crate) fn viewport_data_mut(&mut self) -> Option<&mut ViewportData> {
        match &mut self.kind {
            NodeKind::Viewport(vp) => Some(vp),
            _ => None,
        }
    }
}
