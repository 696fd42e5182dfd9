use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::window::Window;

use crate::coords::{Point, Size};

/// Native window a session renders into.
///
/// `Headless` stands in for a real window when the engine runs over the
/// in-memory device.
#[derive(Clone)]
pub enum PlatformWindow {
    Winit(Arc<Window>),
    Headless(HeadlessWindow),
}

impl PlatformWindow {
    pub fn set_visible(&self, visible: bool) {
        match self {
            PlatformWindow::Winit(w) => w.set_visible(visible),
            PlatformWindow::Headless(w) => w.visible.store(visible, Ordering::Release),
        }
    }

    /// `None` when the platform cannot tell (Wayland, for one).
    pub fn is_visible(&self) -> Option<bool> {
        match self {
            PlatformWindow::Winit(w) => w.is_visible(),
            PlatformWindow::Headless(w) => Some(w.visible.load(Ordering::Acquire)),
        }
    }

    pub fn inner_size(&self) -> Option<Size> {
        match self {
            PlatformWindow::Winit(w) => Some(w.inner_size().into()),
            PlatformWindow::Headless(w) => w.state.lock().size,
        }
    }

    pub fn set_title(&self, title: &str) {
        match self {
            PlatformWindow::Winit(w) => w.set_title(title),
            PlatformWindow::Headless(w) => w.state.lock().title = title.to_owned(),
        }
    }

    /// Asks for a new client size. Returns the size when the platform
    /// applied it at once; otherwise a resize event follows later.
    pub fn request_inner_size(&self, size: Size) -> Option<Size> {
        match self {
            PlatformWindow::Winit(w) => w
                .request_inner_size(PhysicalSize::new(size.width, size.height))
                .map(Size::from),
            PlatformWindow::Headless(w) => {
                w.state.lock().size = Some(size);
                Some(size)
            }
        }
    }

    /// Moves the window. Returns the position when applied at once.
    pub fn set_position(&self, position: Point) -> Option<Point> {
        match self {
            PlatformWindow::Winit(w) => {
                w.set_outer_position(PhysicalPosition::new(position.x, position.y));
                None
            }
            PlatformWindow::Headless(w) => {
                w.state.lock().position = position;
                Some(position)
            }
        }
    }

    /// Brings the window to the front and gives it input focus. Returns
    /// `true` when focus is known to have moved already.
    pub fn focus(&self) -> bool {
        match self {
            PlatformWindow::Winit(w) => {
                w.focus_window();
                false
            }
            PlatformWindow::Headless(w) => {
                w.state.lock().focused = true;
                true
            }
        }
    }

    /// Returns `true` when the window is known to be minimized already.
    pub fn minimize(&self) -> bool {
        match self {
            PlatformWindow::Winit(w) => {
                w.set_minimized(true);
                false
            }
            PlatformWindow::Headless(w) => {
                w.state.lock().minimized = true;
                true
            }
        }
    }

    pub fn request_redraw(&self) {
        if let PlatformWindow::Winit(w) = self {
            w.request_redraw();
        }
    }

    pub(crate) fn surface_target(&self) -> Option<wgpu::SurfaceTarget<'static>> {
        match self {
            PlatformWindow::Winit(w) => Some(w.clone().into()),
            PlatformWindow::Headless(_) => None,
        }
    }

    pub(crate) fn pre_present_notify(&self) {
        if let PlatformWindow::Winit(w) = self {
            w.pre_present_notify();
        }
    }
}

impl std::fmt::Debug for PlatformWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformWindow::Winit(w) => f.debug_tuple("Winit").field(&w.id()).finish(),
            PlatformWindow::Headless(w) => {
                f.debug_tuple("Headless").field(&w.state.lock().title).finish()
            }
        }
    }
}

#[derive(Debug, Default)]
struct HeadlessState {
    title: String,
    size: Option<Size>,
    position: Point,
    focused: bool,
    minimized: bool,
}

/// Window stand-in with no native surface. Requests made through
/// [`PlatformWindow`] apply immediately and can be read back.
#[derive(Debug, Clone)]
pub struct HeadlessWindow {
    state: Arc<Mutex<HeadlessState>>,
    visible: Arc<AtomicBool>,
}

impl HeadlessWindow {
    pub fn new(title: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(HeadlessState {
                title: title.to_owned(),
                ..HeadlessState::default()
            })),
            visible: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn title(&self) -> String {
        self.state.lock().title.clone()
    }

    /// `None` until a size was requested.
    pub fn size(&self) -> Option<Size> {
        self.state.lock().size
    }

    pub fn position(&self) -> Point {
        self.state.lock().position
    }

    pub fn is_focused(&self) -> bool {
        self.state.lock().focused
    }

    pub fn is_minimized(&self) -> bool {
        self.state.lock().minimized
    }
}
