//! Windows: platform handles, per-window sessions and the winit runtime.
//!
//! A [`WindowSession`] owns one platform window, a command thread and the
//! backing texture it presents. [`Runtime`] drives sessions from the winit
//! event loop.

mod error;
mod event;
mod options;
mod platform;
mod runtime;
mod session;

pub use error::WindowError;
pub use event::WinEvent;
pub use options::{WindowFlags, WindowOptions};
pub use platform::{HeadlessWindow, PlatformWindow};
pub use runtime::Runtime;
pub use session::{CloseHook, Lifecycle, WindowSession, WindowState};
