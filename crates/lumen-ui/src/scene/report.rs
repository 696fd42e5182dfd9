use lumen_engine::coords::Rect;

use crate::node::NodeId;

/// How a node changed, which decides how much gets re-rendered.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Change {
    /// Children, geometry or ordering changed. The enclosing viewport and
    /// every viewport nested in it are re-rendered.
    Structural,
    /// Only appearance changed. Repainted in isolation where the node kind
    /// allows it.
    Cosmetic,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RenderOutcome {
    Rendered,
    /// The viewport has empty bounds; nothing was drawn.
    Skipped,
}

/// What one change caused to be re-rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderReport {
    /// Viewports rendered completely, innermost first.
    pub full: Vec<NodeId>,
    /// Nodes repainted on their own after a cosmetic change.
    pub isolated: Vec<NodeId>,
    /// Frames whose subtree was restyled.
    pub restyled: Vec<NodeId>,
    /// Viewports blended into their parent's pixels.
    pub composited: Vec<NodeId>,
    /// Viewports not rendered because their bounds are empty.
    pub skipped: Vec<NodeId>,
    /// Root-space area whose pixels were repainted.
    pub dirty: Option<Rect>,
    /// Whether the dirty area reached a window.
    pub presented: bool,
}

impl RenderReport {
    pub fn is_empty(&self) -> bool {
        self.dirty.is_none() && self.skipped.is_empty()
    }
}
