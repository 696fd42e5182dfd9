//! Lumen UI: a retained tree of nodes and nested viewports rendered on the
//! CPU and presented through a [`lumen_engine::window::WindowSession`].
//!
//! ```rust,ignore
//! use lumen_ui::prelude::*;
//!
//! let mut scene = Scene::new(Size::new(320, 200));
//! let panel = scene.add_viewport(scene.root(), Rect::new(20, 20, 120, 80))?;
//! let swatch = scene.add_child(panel, NodeKind::Fill(Color::rgb(200, 40, 40)), Rect::new(8, 8, 32, 32))?;
//!
//! // Repaints only the swatch's box, then composites the panel back.
//! let report = scene.set_fill(swatch, Color::rgb(40, 200, 40))?;
//! assert_eq!(report.isolated, vec![swatch]);
//! ```

pub mod encode;
pub mod error;
pub mod node;
pub mod render_state;
pub mod scene;
pub mod style;

pub use error::SceneError;
pub use node::{Node, NodeId, NodeKind, ViewportData};
pub use scene::{Change, RenderOutcome, RenderReport, Scene};
pub use style::{ComputedStyle, Style};

pub mod prelude {
    pub use crate::node::{NodeId, NodeKind};
    pub use crate::scene::{Change, RenderReport, Scene};
    pub use crate::style::Style;
    pub use crate::SceneError;

    pub use lumen_engine::coords::{Point, Rect, Size};
    pub use lumen_engine::paint::Color;
}
