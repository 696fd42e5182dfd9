use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};

use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use crate::coords::{Point, Size};
use crate::core::{App, AppControl, EngineCtx};

use super::{PlatformWindow, WindowOptions, WindowSession};

/// Entry point for windowed applications.
///
/// Owns the winit event loop, creates one session per window and turns
/// platform events into session notifications.
pub struct Runtime;

impl Runtime {
    pub fn run<A>(ctx: EngineCtx, initial: WindowOptions, app: A) -> Result<()>
    where
        A: 'static + App,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(ctx, initial, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        state.close_all();
        Ok(())
    }
}

struct AppState<A>
where
    A: App + 'static,
{
    ctx: EngineCtx,
    initial: WindowOptions,
    app: A,

    windows: HashMap<WindowId, WindowSession>,
    exit_requested: bool,
}

impl<A> AppState<A>
where
    A: App + 'static,
{
    fn new(ctx: EngineCtx, initial: WindowOptions, app: A) -> Self {
        Self {
            ctx,
            initial,
            app,
            windows: HashMap::new(),
            exit_requested: false,
        }
    }

    fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    fn create_session(
        &mut self,
        event_loop: &ActiveEventLoop,
        options: &WindowOptions,
    ) -> Result<WindowId> {
        let window = event_loop
            .create_window(options.attributes())
            .context("failed to create window")?;
        let id = window.id();

        let session = WindowSession::open(
            &self.ctx,
            PlatformWindow::Winit(Arc::new(window)),
            options,
        )
        .context("failed to open window session")?;

        if self.app.on_open(&self.ctx, &session) == AppControl::Exit {
            self.request_exit();
        }
        session.show().context("failed to show window")?;
        session.request_redraw();

        self.windows.insert(id, session);
        Ok(id)
    }

    fn close_session(&mut self, id: WindowId) {
        if let Some(session) = self.windows.remove(&id) {
            if let Err(e) = session.close() {
                log::error!("failed to close window: {e}");
            }
            self.dispatch_events(&session);
        }
    }

    /// Closes the session if still open, drops it and exits once no
    /// windows remain.
    fn forget_session(&mut self, id: WindowId) {
        self.close_session(id);
        if self.windows.is_empty() {
            self.request_exit();
        }
    }

    fn close_all(&mut self) {
        let ids: Vec<WindowId> = self.windows.keys().copied().collect();
        for id in ids {
            self.close_session(id);
        }
    }

    /// Feeds queued session notifications to the app, oldest first.
    fn dispatch_events(&mut self, session: &WindowSession) {
        while let Some(ev) = session.poll_event() {
            if self.app.on_event(session, &ev) == AppControl::Exit {
                self.request_exit();
            }
        }
    }
}

impl<A> ApplicationHandler for AppState<A>
where
    A: App + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if !self.windows.is_empty() {
            return;
        }

        let initial = self.initial.clone();
        if let Err(e) = self.create_session(event_loop, &initial) {
            log::error!("failed to create initial window: {e:#}");
            self.request_exit();
            event_loop.exit();
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            self.close_all();
            event_loop.exit();
            return;
        }

        // Retained mode: redraws happen only when a session asks for one.
        event_loop.set_control_flow(ControlFlow::Wait);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        let Some(session) = self.windows.get(&window_id).cloned() else {
            return;
        };

        match &event {
            WindowEvent::CloseRequested => {
                if self.app.on_close_requested(&session) {
                    match session.request_close() {
                        Ok(true) => self.forget_session(window_id),
                        Ok(false) => {}
                        Err(e) => {
                            log::error!("failed to close window: {e}");
                            self.forget_session(window_id);
                        }
                    }
                }
            }

            WindowEvent::Destroyed => self.forget_session(window_id),

            WindowEvent::Resized(new_size) => {
                let size = Size::from(*new_size);
                session.set_minimized(size.is_empty());
                if !size.is_empty() {
                    if let Err(e) = session.resize(size) {
                        log::error!("resize failed: {e}");
                        self.request_exit();
                    }
                    session.request_redraw();
                }
            }

            WindowEvent::Moved(pos) => session.move_to(Point::new(pos.x, pos.y)),

            WindowEvent::Focused(focused) => session.set_focused(*focused),

            WindowEvent::RedrawRequested => {
                if self.app.on_redraw(&session) == AppControl::Exit {
                    self.request_exit();
                }
            }

            _ => {}
        }

        if !session.is_closed() {
            self.dispatch_events(&session);
        }

        if self.exit_requested {
            self.close_all();
            event_loop.exit();
        }
    }
}
