//! Small demo: a window with a nested, half-transparent panel whose swatch
//! changes color whenever the window gains focus.
//!
//! `lumen-studio --snapshot out.png` renders the same scene offscreen and
//! writes it to disk instead of opening a window.

use anyhow::{Context, Result};

use lumen_engine::core::{App, AppControl, EngineConfig, EngineCtx};
use lumen_engine::logging::{init_logging, LoggingConfig};
use lumen_engine::window::{Runtime, WinEvent, WindowOptions, WindowSession};
use lumen_ui::prelude::*;

const SWATCHES: [Color; 3] = [
    Color::rgb(220, 70, 60),
    Color::rgb(60, 170, 90),
    Color::rgb(70, 110, 220),
];

struct Studio {
    scene: Option<Scene>,
    swatch: Option<NodeId>,
    next: usize,
}

impl Studio {
    fn new() -> Self {
        Self {
            scene: None,
            swatch: None,
            next: 0,
        }
    }

    /// Builds the demo tree in one batch.
    fn build(size: Size) -> Result<(Scene, NodeId)> {
        let mut scene = Scene::new(size);
        let root = scene.root();
        scene.begin_update();

        scene.set_style(root, Style::default().with_background(Color::rgb(24, 26, 32)))?;
        let header = scene.add_child(root, NodeKind::Frame, Rect::new(0, 0, size.width, 48))?;
        scene.set_style(header, Style::default().with_background(Color::rgb(40, 44, 56)))?;
        scene.add_child(header, NodeKind::Fill(Color::rgb(240, 180, 60)), Rect::new(12, 12, 24, 24))?;

        let panel = scene.add_viewport(root, Rect::new(40, 80, 360, 240))?;
        scene.set_style(
            panel,
            Style::default()
                .with_background(Color::rgb(230, 230, 240))
                .with_opacity(0.85),
        )?;
        let swatch = scene.add_child(panel, NodeKind::Fill(SWATCHES[0]), Rect::new(24, 24, 96, 96))?;
        scene.add_child(panel, NodeKind::Fill(Color::rgba(0, 0, 0, 90)), Rect::new(72, 72, 200, 120))?;

        scene.end_update()?;
        Ok((scene, swatch))
    }

    fn cycle_swatch(&mut self) -> Result<()> {
        let (Some(scene), Some(swatch)) = (self.scene.as_mut(), self.swatch) else {
            return Ok(());
        };
        self.next = (self.next + 1) % SWATCHES.len();
        let report = scene.set_fill(swatch, SWATCHES[self.next])?;
        log::debug!("swatch repaint touched {:?}", report.dirty);
        Ok(())
    }
}

impl App for Studio {
    fn on_open(&mut self, _ctx: &EngineCtx, session: &WindowSession) -> AppControl {
        let attached = Self::build(session.size()).and_then(|(mut scene, swatch)| {
            scene.attach(session.clone())?;
            Ok((scene, swatch))
        });
        match attached {
            Ok((scene, swatch)) => {
                self.scene = Some(scene);
                self.swatch = Some(swatch);
                AppControl::Continue
            }
            Err(e) => {
                log::error!("failed to build scene: {e:#}");
                AppControl::Exit
            }
        }
    }

    fn on_event(&mut self, _session: &WindowSession, event: &WinEvent) -> AppControl {
        let result: Result<()> = match event {
            WinEvent::Resize(size) => match self.scene.as_mut() {
                Some(scene) => {
                    let root = scene.root();
                    scene.resize_viewport(root, *size).map(drop).map_err(Into::into)
                }
                None => Ok(()),
            },
            WinEvent::Focus => self.cycle_swatch(),
            WinEvent::Close => {
                self.scene = None;
                Ok(())
            }
            WinEvent::Move(_) | WinEvent::DeFocus | WinEvent::Minimize => Ok(()),
        };
        if let Err(e) = result {
            log::error!("scene update failed: {e:#}");
            return AppControl::Exit;
        }
        AppControl::Continue
    }

    fn on_redraw(&mut self, _session: &WindowSession) -> AppControl {
        if let Some(scene) = self.scene.as_mut() {
            if let Err(e) = scene.render() {
                log::error!("redraw failed: {e}");
                return AppControl::Exit;
            }
        }
        AppControl::Continue
    }
}

fn snapshot(path: &str) -> Result<()> {
    let (scene, _) = Studio::build(Size::new(480, 360))?;
    scene
        .save_png(scene.root(), path)
        .with_context(|| format!("failed to write snapshot to {path}"))
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let [flag, path] = args.as_slice() {
        if flag == "--snapshot" {
            return snapshot(path);
        }
    }

    let ctx = EngineCtx::new(EngineConfig::default()).context("failed to start the renderer")?;
    Runtime::run(
        ctx,
        WindowOptions::new("lumen studio", Size::new(480, 360)),
        Studio::new(),
    )
}
