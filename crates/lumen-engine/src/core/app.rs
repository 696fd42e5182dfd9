use super::EngineCtx;
use crate::window::{WinEvent, WindowSession};

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract implemented by higher layers.
pub trait App {
    /// Called once per window, after its session exists and before it is shown.
    fn on_open(&mut self, ctx: &EngineCtx, session: &WindowSession) -> AppControl;

    /// Called for each queued session notification, oldest first.
    fn on_event(&mut self, session: &WindowSession, event: &WinEvent) -> AppControl {
        let _ = (session, event);
        AppControl::Continue
    }

    /// Called when the user asks to close a window. Returning `false` keeps
    /// it open; the session's own close-request hook is asked after this.
    fn on_close_requested(&mut self, session: &WindowSession) -> bool {
        let _ = session;
        true
    }

    /// Called when the platform asks for the window contents.
    fn on_redraw(&mut self, session: &WindowSession) -> AppControl;
}
