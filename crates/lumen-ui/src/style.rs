use lumen_engine::paint::Color;

/// Per-node visual properties.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Style {
    /// Painted under the node's content, across its whole rect.
    pub background: Option<Color>,
    /// Multiplies into descendants up to the next viewport.
    pub opacity: f32,
    pub visible: bool,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            background: None,
            opacity: 1.0,
            visible: true,
        }
    }
}

impl Style {
    pub fn with_background(mut self, color: Color) -> Self {
        self.background = Some(color);
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

/// Style after inheritance.
///
/// Opacity accumulates down the tree but restarts inside each viewport: a
/// viewport's own opacity is applied once, when its buffer is composited
/// into the parent.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ComputedStyle {
    pub background: Option<Color>,
    pub opacity: f32,
    pub visible: bool,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            background: None,
            opacity: 1.0,
            visible: true,
        }
    }
}

impl ComputedStyle {
    /// Combines `style` with the computed style of its parent.
    ///
    /// `inherited_opacity` is the opacity content inside the parent starts
    /// from (1.0 when the parent is a viewport).
    pub fn derive(style: &Style, parent_visible: bool, inherited_opacity: f32) -> Self {
        Self {
            background: style.background,
            opacity: (style.opacity * inherited_opacity).clamp(0.0, 1.0),
            visible: style.visible && parent_visible,
        }
    }
}
