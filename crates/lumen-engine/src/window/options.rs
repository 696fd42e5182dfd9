use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::window::{Window, WindowAttributes};

use crate::coords::{Point, Size};

/// Style hints for a new window.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct WindowFlags {
    /// Undecorated, fixed-size utility window.
    pub tool: bool,
    /// Start maximized.
    pub fullscreen: bool,
}

/// Creation parameters. Sizes and positions are physical pixels.
#[derive(Debug, Clone)]
pub struct WindowOptions {
    pub title: String,
    pub size: Size,
    pub position: Option<Point>,
    pub flags: WindowFlags,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            title: "lumen".to_string(),
            size: Size::new(1280, 720),
            position: None,
            flags: WindowFlags::default(),
        }
    }
}

impl WindowOptions {
    pub fn new(title: impl Into<String>, size: Size) -> Self {
        Self {
            title: title.into(),
            size,
            ..Self::default()
        }
    }

    /// Platform attributes. Windows always start hidden; sessions show them
    /// explicitly.
    pub fn attributes(&self) -> WindowAttributes {
        let mut attrs = Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(PhysicalSize::new(self.size.width, self.size.height))
            .with_visible(false)
            .with_decorations(!self.flags.tool)
            .with_resizable(!self.flags.tool)
            .with_maximized(self.flags.fullscreen);

        if let Some(p) = self.position {
            attrs = attrs.with_position(PhysicalPosition::new(p.x, p.y));
        }
        attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_window_is_hidden_decorated_and_resizable() {
        let attrs = WindowOptions::default().attributes();
        assert!(!attrs.visible);
        assert!(attrs.decorations);
        assert!(attrs.resizable);
        assert!(!attrs.maximized);
        assert!(attrs.position.is_none());
    }

    #[test]
    fn flags_map_to_platform_hints() {
        let opts = WindowOptions {
            position: Some(Point::new(40, 30)),
            flags: WindowFlags {
                tool: true,
                fullscreen: true,
            },
            ..WindowOptions::new("palette", Size::new(200, 100))
        };
        let attrs = opts.attributes();
        assert!(!attrs.visible);
        assert!(!attrs.decorations);
        assert!(!attrs.resizable);
        assert!(attrs.maximized);
        assert_eq!(attrs.title, "palette");
        assert!(attrs.position.is_some());
    }
}
