//! Clip stack shared by every viewport render pass.

use std::ops::{Deref, DerefMut};

use lumen_engine::coords::Rect;

/// Stack of active clip rects.
///
/// Each viewport pushes its own bounds as a fresh coordinate space; frames
/// and region repaints push clips that intersect with the current top. Every
/// push hands back a guard that pops on drop, so early returns keep the
/// stack balanced.
#[derive(Debug, Default)]
pub struct RenderState {
    stack: Vec<Rect>,
}

impl RenderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a viewport's coordinate space. An empty rect pushes nothing and
    /// returns `None`; the caller skips rendering.
    pub fn push_bounds(&mut self, bounds: Rect) -> Option<ClipGuard<'_>> {
        if bounds.is_empty() {
            return None;
        }
        self.stack.push(bounds);
        Some(ClipGuard { state: self })
    }

    /// Narrows the current clip. `None` when nothing remains visible.
    pub fn push_clip(&mut self, rect: Rect) -> Option<ClipGuard<'_>> {
        let effective = match self.stack.last() {
            None => Some(rect).filter(|r| !r.is_empty()),
            Some(&top) => top.intersect(rect),
        }?;
        self.stack.push(effective);
        Some(ClipGuard { state: self })
    }

    /// Current effective clip.
    pub fn clip(&self) -> Option<Rect> {
        self.stack.last().copied()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

/// Pops its clip when dropped. Derefs to the state so nested pushes borrow
/// through it.
#[must_use = "the clip is popped as soon as the guard is dropped"]
pub struct ClipGuard<'a> {
    state: &'a mut RenderState,
}

impl ClipGuard<'_> {
    /// The clip this guard pushed.
    pub fn rect(&self) -> Rect {
        // A live guard always sits above its own entry.
        self.state.stack.last().copied().unwrap_or_default()
    }
}

impl Deref for ClipGuard<'_> {
    type Target = RenderState;

    fn deref(&self) -> &RenderState {
        self.state
    }
}

impl DerefMut for ClipGuard<'_> {
    fn deref_mut(&mut self) -> &mut RenderState {
        self.state
    }
}

impl Drop for ClipGuard<'_> {
    fn drop(&mut self) {
        debug_assert!(!self.state.stack.is_empty(), "clip stack underflow");
        self.state.stack.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bounds_push_nothing() {
        let mut rs = RenderState::new();
        assert!(rs.push_bounds(Rect::new(5, 5, 0, 10)).is_none());
        assert_eq!(rs.depth(), 0);
    }

    #[test]
    fn clips_intersect_and_pop_in_order() {
        let mut rs = RenderState::new();
        {
            let mut outer = rs.push_bounds(Rect::new(0, 0, 100, 100)).unwrap();
            {
                let inner = outer.push_clip(Rect::new(50, 50, 100, 100)).unwrap();
                assert_eq!(inner.rect(), Rect::new(50, 50, 50, 50));
                assert_eq!(inner.depth(), 2);
            }
            assert_eq!(outer.clip(), Some(Rect::new(0, 0, 100, 100)));
            assert!(outer.push_clip(Rect::new(200, 200, 5, 5)).is_none());
            assert_eq!(outer.depth(), 1);
        }
        assert_eq!(rs.depth(), 0);
    }

    #[test]
    fn bounds_start_a_new_space() {
        let mut rs = RenderState::new();
        let mut parent = rs.push_bounds(Rect::new(0, 0, 10, 10)).unwrap();
        let child = parent.push_bounds(Rect::new(0, 0, 40, 40)).unwrap();
        assert_eq!(child.rect(), Rect::new(0, 0, 40, 40));
    }

    #[test]
    fn early_return_keeps_stack_balanced() {
        fn render(rs: &mut RenderState, bail: bool) -> Option<()> {
            let mut g = rs.push_bounds(Rect::new(0, 0, 8, 8))?;
            let _c = g.push_clip(Rect::new(2, 2, 2, 2))?;
            if bail {
                return None;
            }
            Some(())
        }
        let mut rs = RenderState::new();
        assert!(render(&mut rs, true).is_none());
        assert!(render(&mut rs, false).is_some());
        assert_eq!(rs.depth(), 0);
    }
}
