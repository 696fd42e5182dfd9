use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use image::RgbaImage;
use parking_lot::Mutex;

use crate::coords::{Point, Rect, Size};
use crate::core::EngineCtx;
use crate::device::{Gpu, SurfaceId};
use crate::exec::{ExecutorError, RenderExecutor};
use crate::texture::Texture;

use super::{PlatformWindow, WinEvent, WindowError, WindowOptions};

/// Cleanup registered by the window's owner; runs once during [`WindowSession::close`].
pub type CloseHook = Box<dyn FnOnce() + Send>;

/// Asked by [`WindowSession::request_close`]; returning `false` keeps the window open.
pub type CloseRequestHook = Box<dyn FnMut() -> bool + Send>;

type WinJob = Box<dyn FnOnce() + Send>;

enum WinRequest {
    Run(WinJob),
    Stop,
}

/// Lifecycle of a session. Focus and minimized state vary independently
/// while `Shown`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Lifecycle {
    Created,
    Shown,
    Closing,
    Closed,
}

/// Snapshot of a session's window state.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct WindowState {
    pub lifecycle: Lifecycle,
    pub size: Size,
    pub position: Point,
    pub focused: bool,
    pub minimized: bool,
}

struct Shared {
    id: u64,
    title: Mutex<String>,
    exec: RenderExecutor,
    surface: SurfaceId,
    platform: Mutex<Option<PlatformWindow>>,
    state: Mutex<WindowState>,
    events: Mutex<VecDeque<WinEvent>>,
    win_tex: Arc<Mutex<Texture>>,

    queue: Mutex<Option<Sender<WinRequest>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
    closing: Arc<AtomicBool>,
    close_hook: Mutex<Option<CloseHook>>,
    close_request: Mutex<Option<CloseRequestHook>>,
}

impl Shared {
    fn push_event(&self, event: WinEvent) {
        self.events.lock().push_back(event);
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if self.closing.swap(true, Ordering::AcqRel) {
            return;
        }
        // Dropped without close(): stop the thread and hand GPU resources back.
        log::debug!("window session {} dropped without close", self.id);
        self.queue.lock().take();
        let tex = self.win_tex.clone();
        let platform = self.platform.lock().take();
        let surface = self.surface;
        self.exec
            .post(move |gpu| {
                tex.lock().delete(gpu).ok();
                gpu.destroy_surface(surface).ok();
                drop(platform);
            })
            .ok();
    }
}

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// A platform window with its own command thread and backing texture.
///
/// Every request funnels through the window thread's FIFO queue, and every
/// GPU call from there through the shared render executor. Callers only ever
/// enqueue work; they never touch the device directly.
///
/// Cheap to clone; all clones refer to the same window.
#[derive(Clone)]
pub struct WindowSession {
    shared: Arc<Shared>,
}

impl WindowSession {
    /// Creates the surface and backing texture and starts the window thread.
    /// The window stays hidden until [`show`](Self::show).
    pub fn open(
        ctx: &EngineCtx,
        platform: PlatformWindow,
        options: &WindowOptions,
    ) -> Result<Self, WindowError> {
        let id = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
        let exec = ctx.executor().clone();
        let size = platform.inner_size().unwrap_or(options.size);

        let target = platform.clone();
        let surface = exec.run(move |gpu| gpu.create_surface(&target, size))??;

        let (tx, rx) = mpsc::channel();
        let closing = Arc::new(AtomicBool::new(false));
        let thread_closing = closing.clone();
        let thread = thread::Builder::new()
            .name(format!("lumen-win-{id}"))
            .spawn(move || serve(id, rx, thread_closing))
            .map_err(|e| WindowError::Platform(format!("failed to spawn window thread: {e}")))?;

        log::debug!(
            "window session {id} `{}` opened at {}x{}",
            options.title,
            size.width,
            size.height
        );

        Ok(Self {
            shared: Arc::new(Shared {
                id,
                title: Mutex::new(options.title.clone()),
                exec,
                surface,
                platform: Mutex::new(Some(platform)),
                state: Mutex::new(WindowState {
                    lifecycle: Lifecycle::Created,
                    size,
                    position: options.position.unwrap_or_default(),
                    focused: false,
                    minimized: false,
                }),
                events: Mutex::new(VecDeque::new()),
                win_tex: Arc::new(Mutex::new(Texture::new(size))),
                queue: Mutex::new(Some(tx)),
                thread_id: thread.thread().id(),
                thread: Mutex::new(Some(thread)),
                closing,
                close_hook: Mutex::new(None),
                close_request: Mutex::new(None),
            }),
        })
    }

    /// Makes the window visible. Only the first call has an effect.
    pub fn show(&self) -> Result<(), WindowError> {
        let mut state = self.shared.state.lock();
        match state.lifecycle {
            Lifecycle::Created => {
                if let Some(p) = self.shared.platform.lock().as_ref() {
                    p.set_visible(true);
                }
                state.lifecycle = Lifecycle::Shown;
                Ok(())
            }
            Lifecycle::Shown => Ok(()),
            Lifecycle::Closing | Lifecycle::Closed => Err(WindowError::Closed),
        }
    }

    // ── window thread ─────────────────────────────────────────────────────

    /// Runs `f` on the window thread and waits for it.
    ///
    /// Ordered after everything queued before it. Returns [`WindowError::Closed`]
    /// when a close got there first and the request was dropped unexecuted.
    ///
    /// Called from a render job (a [`with_win_tex`](Self::with_win_tex)
    /// closure, say) it fails with [`ExecutorError::Reentrant`]: the window
    /// thread is itself waiting on that job.
    pub fn run_on_win<R, F>(&self, f: F) -> Result<R, WindowError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_window_thread() {
            return Ok(f());
        }
        self.refuse_render_thread()?;
        let (done_tx, done_rx) = mpsc::sync_channel(1);
        self.enqueue(Box::new(move || {
            done_tx.send(f()).ok();
        }))?;
        done_rx.recv().map_err(|_| {
            log::warn!("window session {}: request discarded by close", self.shared.id);
            WindowError::Closed
        })
    }

    /// Queues `f` on the window thread without waiting.
    pub fn post_on_win<F>(&self, f: F) -> Result<(), WindowError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(Box::new(f))
    }

    /// Runs `f` with the backing texture on the render thread, ordered
    /// through the window queue. `f` must not wait on this session; such
    /// calls return [`ExecutorError::Reentrant`].
    pub fn with_win_tex<R, F>(&self, f: F) -> Result<R, WindowError>
    where
        F: FnOnce(&mut Texture, &mut Gpu) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.render(move |gpu, tex, _| Ok(f(tex, gpu)))
    }

    /// Copies `pixels` into the backing texture with its top-left at `at`.
    /// Parts outside the window are dropped.
    pub fn upload(&self, at: Point, pixels: RgbaImage) -> Result<(), WindowError> {
        self.render(move |gpu, tex, _| {
            let src = Rect::from_size(Size::new(pixels.width(), pixels.height()));
            tex.set_sub_image(gpu, at, &pixels, src)?;
            Ok(())
        })
    }

    /// Presents the surface and waits until the present has happened.
    pub fn publish(&self) -> Result<(), WindowError> {
        self.render(|gpu, _, surface| {
            gpu.present(surface)?;
            Ok(())
        })
    }

    /// Draws the backing texture onto the surface, then publishes.
    pub fn publish_tex(&self) -> Result<(), WindowError> {
        self.render(|gpu, tex, surface| {
            gpu.make_current(surface)?;
            if !tex.size().is_empty() {
                tex.activate(gpu, 0)?;
                if let Some(id) = tex.handle() {
                    gpu.blit(surface, id)?;
                }
            }
            gpu.present(surface)?;
            Ok(())
        })
    }

    // ── notifications ─────────────────────────────────────────────────────

    /// Tracks a new client size. Surface and backing texture follow; the
    /// texture's old contents are gone and the caller repaints.
    pub fn resize(&self, size: Size) -> Result<(), WindowError> {
        {
            let mut state = self.shared.state.lock();
            if self.is_closed() {
                return Err(WindowError::Closed);
            }
            if state.size == size {
                return Ok(());
            }
            state.size = size;
            self.shared.push_event(WinEvent::Resize(size));
        }
        self.render(move |gpu, tex, surface| {
            gpu.resize_surface(surface, size)?;
            tex.set_size(gpu, size)?;
            Ok(())
        })
    }

    // State notifications below are dropped once close has begun, so
    // `Close` stays the last event a session emits.

    pub fn move_to(&self, position: Point) {
        self.notify(|state| {
            state.position = position;
            Some(WinEvent::Move(position))
        });
    }

    pub fn set_focused(&self, focused: bool) {
        self.notify(|state| {
            let changed = std::mem::replace(&mut state.focused, focused) != focused;
            changed.then_some(if focused { WinEvent::Focus } else { WinEvent::DeFocus })
        });
    }

    pub fn set_minimized(&self, minimized: bool) {
        self.notify(|state| {
            let entered = !std::mem::replace(&mut state.minimized, minimized) && minimized;
            entered.then_some(WinEvent::Minimize)
        });
    }

    // ── window control ────────────────────────────────────────────────────
    //
    // Queued on the window thread without waiting: some platforms forward
    // these calls to the event-loop thread, which is usually the caller.

    pub fn set_title(&self, title: &str) -> Result<(), WindowError> {
        let title = title.to_owned();
        self.control(move |session, platform| {
            platform.set_title(&title);
            *session.shared.title.lock() = title;
            Ok(())
        })
    }

    /// Asks the platform for a new client size. When it applies the size at
    /// once the session resizes right away; otherwise the platform's resize
    /// event does it later.
    pub fn set_size(&self, size: Size) -> Result<(), WindowError> {
        self.control(move |session, platform| match platform.request_inner_size(size) {
            Some(applied) => session.resize(applied),
            None => Ok(()),
        })
    }

    pub fn set_position(&self, position: Point) -> Result<(), WindowError> {
        self.control(move |session, platform| {
            if let Some(applied) = platform.set_position(position) {
                session.move_to(applied);
            }
            Ok(())
        })
    }

    /// Brings the window to the front with input focus.
    pub fn raise(&self) -> Result<(), WindowError> {
        self.control(|session, platform| {
            if platform.focus() {
                session.set_focused(true);
            }
            Ok(())
        })
    }

    pub fn minimize(&self) -> Result<(), WindowError> {
        self.control(|session, platform| {
            if platform.minimize() {
                session.set_minimized(true);
            }
            Ok(())
        })
    }

    /// Registers the check consulted by [`request_close`](Self::request_close),
    /// replacing any earlier one.
    pub fn on_close_request(&self, hook: impl FnMut() -> bool + Send + 'static) {
        *self.shared.close_request.lock() = Some(Box::new(hook));
    }

    /// Closes the window unless the close-request hook vetoes it. Returns
    /// whether the session is closed afterwards.
    pub fn request_close(&self) -> Result<bool, WindowError> {
        if self.is_closed() {
            return Ok(true);
        }
        // Taken out while it runs so the hook may use this session.
        let hook = self.shared.close_request.lock().take();
        let allowed = match hook {
            Some(mut hook) => {
                let allowed = hook();
                self.shared.close_request.lock().get_or_insert(hook);
                allowed
            }
            None => true,
        };
        if !allowed {
            log::debug!("window session {}: close vetoed", self.shared.id);
            return Ok(false);
        }
        self.close()?;
        Ok(true)
    }

    /// Registers the cleanup run during close, replacing any earlier one.
    pub fn on_close(&self, hook: impl FnOnce() + Send + 'static) {
        *self.shared.close_hook.lock() = Some(Box::new(hook));
    }

    pub fn request_redraw(&self) {
        if let Some(p) = self.shared.platform.lock().as_ref() {
            p.request_redraw();
        }
    }

    /// Ordered teardown.
    ///
    /// The window thread stops taking requests (queued ones are discarded),
    /// the close hook runs, `Close` is emitted, the backing texture and
    /// surface are released, and the platform window is dropped on the
    /// render thread. Later calls are no-ops.
    pub fn close(&self) -> Result<(), WindowError> {
        let shared = &self.shared;
        self.refuse_render_thread()?;
        {
            let mut state = shared.state.lock();
            if shared.closing.swap(true, Ordering::AcqRel) {
                log::debug!("window session {}: close called again", shared.id);
                return Ok(());
            }
            state.lifecycle = Lifecycle::Closing;
        }

        if let Some(tx) = shared.queue.lock().take() {
            tx.send(WinRequest::Stop).ok();
        }
        if !self.is_window_thread() {
            if let Some(handle) = shared.thread.lock().take() {
                if handle.join().is_err() {
                    log::error!("window thread {} panicked", shared.id);
                }
            }
        }

        if let Some(hook) = shared.close_hook.lock().take() {
            hook();
        }
        shared.push_event(WinEvent::Close);

        let tex = shared.win_tex.clone();
        let platform = shared.platform.lock().take();
        let surface = shared.surface;
        let released = shared.exec.run(move |gpu| -> Result<(), WindowError> {
            let tex_result = tex.lock().delete(gpu);
            let surface_result = gpu.destroy_surface(surface);
            if let Some(p) = platform.as_ref() {
                p.set_visible(false);
            }
            drop(platform);
            tex_result?;
            surface_result?;
            Ok(())
        });

        shared.state.lock().lifecycle = Lifecycle::Closed;
        log::info!("window session {} `{}` closed", shared.id, shared.title.lock());
        released?
    }

    // ── queries ───────────────────────────────────────────────────────────

    /// Next pending notification, oldest first.
    pub fn poll_event(&self) -> Option<WinEvent> {
        self.shared.events.lock().pop_front()
    }

    pub fn drain_events(&self) -> Vec<WinEvent> {
        self.shared.events.lock().drain(..).collect()
    }

    pub fn state(&self) -> WindowState {
        *self.shared.state.lock()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.state.lock().lifecycle
    }

    pub fn size(&self) -> Size {
        self.shared.state.lock().size
    }

    pub fn title(&self) -> String {
        self.shared.title.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closing.load(Ordering::Acquire)
    }

    pub fn surface_id(&self) -> SurfaceId {
        self.shared.surface
    }

    pub fn executor(&self) -> &RenderExecutor {
        &self.shared.exec
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    // ── internals ─────────────────────────────────────────────────────────

    fn is_window_thread(&self) -> bool {
        thread::current().id() == self.shared.thread_id
    }

    fn refuse_render_thread(&self) -> Result<(), WindowError> {
        if self.shared.exec.is_render_thread() {
            log::warn!("window session {}: blocking call from the render thread", self.shared.id);
            return Err(ExecutorError::Reentrant.into());
        }
        Ok(())
    }

    /// Applies a state change and queues its event, unless close has begun.
    fn notify(&self, change: impl FnOnce(&mut WindowState) -> Option<WinEvent>) {
        let mut state = self.shared.state.lock();
        if self.is_closed() {
            log::debug!("window session {}: notification after close ignored", self.shared.id);
            return;
        }
        if let Some(event) = change(&mut state) {
            self.shared.push_event(event);
        }
    }

    /// Queues a platform request; a failure inside it is logged.
    fn control<F>(&self, f: F) -> Result<(), WindowError>
    where
        F: FnOnce(&WindowSession, &PlatformWindow) -> Result<(), WindowError> + Send + 'static,
    {
        let session = self.clone();
        self.post_on_win(move || {
            let Some(platform) = session.shared.platform.lock().clone() else {
                return;
            };
            if let Err(e) = f(&session, &platform) {
                log::warn!("window session {}: window control failed: {e}", session.shared.id);
            }
        })
    }

    fn enqueue(&self, job: WinJob) -> Result<(), WindowError> {
        if self.shared.closing.load(Ordering::Acquire) {
            return Err(WindowError::Closed);
        }
        let queue = self.shared.queue.lock();
        let tx = queue.as_ref().ok_or(WindowError::Closed)?;
        tx.send(WinRequest::Run(job))
            .map_err(|_| WindowError::Closed)
    }

    /// Window queue → render executor hop shared by every GPU-touching request.
    fn render<R, F>(&self, f: F) -> Result<R, WindowError>
    where
        F: FnOnce(&mut Gpu, &mut Texture, SurfaceId) -> Result<R, WindowError> + Send + 'static,
        R: Send + 'static,
    {
        let exec = self.shared.exec.clone();
        let tex = self.shared.win_tex.clone();
        let surface = self.shared.surface;
        self.run_on_win(move || exec.run(move |gpu| f(gpu, &mut tex.lock(), surface)))??
    }
}

impl std::fmt::Debug for WindowSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowSession")
            .field("id", &self.shared.id)
            .field("title", &*self.shared.title.lock())
            .field("state", &self.state())
            .finish()
    }
}

fn serve(id: u64, rx: Receiver<WinRequest>, closing: Arc<AtomicBool>) {
    let mut discarded = 0usize;
    while let Ok(req) = rx.recv() {
        match req {
            WinRequest::Run(job) => {
                if closing.load(Ordering::Acquire) {
                    discarded += 1;
                    continue;
                }
                job();
            }
            WinRequest::Stop => break,
        }
    }
    discarded += rx.try_iter().count();
    if discarded > 0 {
        log::warn!("window thread {id}: discarded {discarded} requests at close");
    }
    log::debug!("window thread {id} stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EngineConfig, EngineCtx};
    use crate::window::HeadlessWindow;
    use image::Rgba;
    use std::time::Duration;

    fn open(size: Size) -> (EngineCtx, WindowSession) {
        let ctx = EngineCtx::headless(EngineConfig::default()).unwrap();
        let session = WindowSession::open(
            &ctx,
            PlatformWindow::Headless(HeadlessWindow::new("test")),
            &WindowOptions::new("test", size),
        )
        .unwrap();
        (ctx, session)
    }

    fn read_surface(session: &WindowSession) -> RgbaImage {
        let s = session.surface_id();
        session
            .executor()
            .run(move |gpu| gpu.read_surface(s))
            .unwrap()
            .unwrap()
            .unwrap()
    }

    #[test]
    fn publish_before_any_draw_presents_default_contents() {
        let (_ctx, session) = open(Size::new(800, 600));
        session.publish().unwrap();

        let s = session.surface_id();
        let presented = session.executor().run(move |gpu| gpu.frames_presented(s)).unwrap();
        assert_eq!(presented, 1);
        assert_eq!(read_surface(&session).dimensions(), (800, 600));
    }

    #[test]
    fn resize_discards_backing_contents() {
        let (_ctx, session) = open(Size::new(800, 600));
        session
            .upload(Point::zero(), RgbaImage::from_pixel(800, 600, Rgba([9, 9, 9, 255])))
            .unwrap();
        session.publish_tex().unwrap();

        session.resize(Size::new(400, 300)).unwrap();

        let (size, mirror_dropped, pixels) = session
            .with_win_tex(|tex, gpu| (tex.size(), tex.image().is_none(), tex.read_back(gpu)))
            .unwrap();
        let pixels = pixels.unwrap();
        assert_eq!(size, Size::new(400, 300));
        assert!(mirror_dropped);
        assert_eq!(pixels.dimensions(), (400, 300));
        assert!(pixels.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn publish_tex_puts_uploaded_pixels_on_screen() {
        let (_ctx, session) = open(Size::new(4, 4));
        let red = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        session.upload(Point::new(2, 2), red).unwrap();
        session.publish_tex().unwrap();

        let screen = read_surface(&session);
        assert_eq!(screen.get_pixel(3, 3).0, [255, 0, 0, 255]);
        assert_eq!(screen.get_pixel(0, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn requests_run_on_window_thread_in_order() {
        let (_ctx, session) = open(Size::new(8, 8));
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..4 {
            let log = log.clone();
            session.post_on_win(move || log.lock().push(i)).unwrap();
        }
        let name = session
            .run_on_win(|| thread::current().name().map(str::to_string))
            .unwrap();
        assert_eq!(*log.lock(), vec![0, 1, 2, 3]);
        assert_eq!(name, Some(format!("lumen-win-{}", session.id())));
    }

    #[test]
    fn close_discards_queued_requests() {
        let (_ctx, session) = open(Size::new(8, 8));
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let ran_second = Arc::new(AtomicBool::new(false));

        session
            .post_on_win(move || {
                started_tx.send(()).ok();
                release_rx.recv().ok();
            })
            .unwrap();
        let flag = ran_second.clone();
        session
            .post_on_win(move || flag.store(true, Ordering::SeqCst))
            .unwrap();
        started_rx.recv().unwrap();

        let closer = {
            let session = session.clone();
            thread::spawn(move || session.close())
        };
        while session.lifecycle() == Lifecycle::Created {
            thread::sleep(Duration::from_millis(1));
        }
        release_tx.send(()).unwrap();
        closer.join().unwrap().unwrap();

        assert!(!ran_second.load(Ordering::SeqCst));
        assert_eq!(session.lifecycle(), Lifecycle::Closed);
        assert!(matches!(session.run_on_win(|| ()), Err(WindowError::Closed)));
        assert!(matches!(session.publish(), Err(WindowError::Closed)));
    }

    #[test]
    fn close_is_idempotent_and_runs_hook_once() {
        let (_ctx, session) = open(Size::new(8, 8));
        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();
        session.on_close(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        session.close().unwrap();
        session.close().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let closes = session
            .drain_events()
            .into_iter()
            .filter(|e| *e == WinEvent::Close)
            .count();
        assert_eq!(closes, 1);
    }

    #[test]
    fn close_releases_surface_and_texture() {
        let (_ctx, session) = open(Size::new(8, 8));
        session.publish_tex().unwrap();
        let tex = session.with_win_tex(|tex, _| tex.handle()).unwrap().unwrap();
        let s = session.surface_id();

        session.close().unwrap();

        let (texture_gone, surface_gone) = session
            .executor()
            .run(move |gpu| {
                (
                    gpu.bound_texture(0) != Some(tex),
                    gpu.current_surface() != Some(s),
                )
            })
            .unwrap();
        assert!(texture_gone);
        assert!(surface_gone);
    }

    #[test]
    fn notifications_arrive_in_order() {
        let (_ctx, session) = open(Size::new(8, 8));
        session.show().unwrap();
        session.move_to(Point::new(10, 20));
        session.resize(Size::new(16, 8)).unwrap();
        session.set_focused(true);
        session.set_focused(true);
        session.set_focused(false);
        session.set_minimized(true);
        session.close().unwrap();

        assert_eq!(
            session.drain_events(),
            vec![
                WinEvent::Move(Point::new(10, 20)),
                WinEvent::Resize(Size::new(16, 8)),
                WinEvent::Focus,
                WinEvent::DeFocus,
                WinEvent::Minimize,
                WinEvent::Close,
            ]
        );
        assert!(session.poll_event().is_none());
    }

    #[test]
    fn show_moves_created_to_shown() {
        let window = HeadlessWindow::new("shown");
        let ctx = EngineCtx::headless(EngineConfig::default()).unwrap();
        let platform = PlatformWindow::Headless(window);
        let session =
            WindowSession::open(&ctx, platform.clone(), &WindowOptions::default()).unwrap();

        assert_eq!(session.lifecycle(), Lifecycle::Created);
        assert_eq!(platform.is_visible(), Some(false));
        session.show().unwrap();
        assert_eq!(session.lifecycle(), Lifecycle::Shown);
        assert_eq!(platform.is_visible(), Some(true));

        session.close().unwrap();
        assert!(session.show().is_err());
    }

    #[test]
    fn notifications_after_close_are_refused() {
        let (_ctx, session) = open(Size::new(8, 8));
        session.close().unwrap();
        let before = session.state();

        assert!(matches!(session.resize(Size::new(4, 4)), Err(WindowError::Closed)));
        session.move_to(Point::new(5, 5));
        session.set_focused(true);
        session.set_minimized(true);

        let after = session.state();
        assert_eq!(after.size, before.size);
        assert_eq!(after.position, before.position);
        assert!(!after.focused && !after.minimized);
        assert_eq!(session.drain_events(), vec![WinEvent::Close]);
    }

    #[test]
    fn window_controls_reach_the_platform() {
        let window = HeadlessWindow::new("before");
        let ctx = EngineCtx::headless(EngineConfig::default()).unwrap();
        let session = WindowSession::open(
            &ctx,
            PlatformWindow::Headless(window.clone()),
            &WindowOptions::new("before", Size::new(8, 8)),
        )
        .unwrap();

        session.set_title("after").unwrap();
        session.set_size(Size::new(12, 6)).unwrap();
        session.set_position(Point::new(30, 40)).unwrap();
        session.raise().unwrap();
        session.minimize().unwrap();
        session.run_on_win(|| ()).unwrap();

        assert_eq!(window.title(), "after");
        assert_eq!(session.title(), "after");
        assert_eq!(window.size(), Some(Size::new(12, 6)));
        assert_eq!(window.position(), Point::new(30, 40));
        assert!(window.is_focused() && window.is_minimized());

        let tex_size = session.with_win_tex(|tex, _| tex.size()).unwrap();
        assert_eq!(tex_size, Size::new(12, 6));
        assert_eq!(
            session.drain_events(),
            vec![
                WinEvent::Resize(Size::new(12, 6)),
                WinEvent::Move(Point::new(30, 40)),
                WinEvent::Focus,
                WinEvent::Minimize,
            ]
        );

        session.close().unwrap();
        assert!(matches!(session.set_title("late"), Err(WindowError::Closed)));
        assert!(matches!(session.raise(), Err(WindowError::Closed)));
        assert_eq!(window.title(), "after");
    }

    #[test]
    fn close_request_can_be_vetoed() {
        let (_ctx, session) = open(Size::new(8, 8));
        let allow = Arc::new(AtomicBool::new(false));
        let asked = Arc::new(AtomicU64::new(0));
        {
            let (allow, asked) = (allow.clone(), asked.clone());
            session.on_close_request(move || {
                asked.fetch_add(1, Ordering::SeqCst);
                allow.load(Ordering::SeqCst)
            });
        }

        assert!(!session.request_close().unwrap());
        assert_eq!(session.lifecycle(), Lifecycle::Created);
        assert!(session.drain_events().is_empty());
        session.publish().unwrap();

        allow.store(true, Ordering::SeqCst);
        assert!(session.request_close().unwrap());
        assert_eq!(session.lifecycle(), Lifecycle::Closed);
        assert_eq!(asked.load(Ordering::SeqCst), 2);

        // Already closed: the hook is not asked again.
        assert!(session.request_close().unwrap());
        assert_eq!(asked.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn render_job_calling_back_into_session_fails_instead_of_blocking() {
        let (_ctx, session) = open(Size::new(8, 8));
        let inner = session.clone();
        let (publish, close, post) = session
            .with_win_tex(move |_, _| (inner.publish(), inner.close(), inner.post_on_win(|| ())))
            .unwrap();

        assert!(matches!(
            publish,
            Err(WindowError::Executor(ExecutorError::Reentrant))
        ));
        assert!(matches!(
            close,
            Err(WindowError::Executor(ExecutorError::Reentrant))
        ));
        assert!(post.is_ok());
        assert!(!session.is_closed());
        session.publish().unwrap();
    }
}
