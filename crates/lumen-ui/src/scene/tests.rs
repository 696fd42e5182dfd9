use image::Rgba;

use lumen_engine::core::{EngineConfig, EngineCtx};
use lumen_engine::window::{HeadlessWindow, PlatformWindow, WindowOptions};

use super::*;

const WHITE: Color = Color::WHITE;
const RED: Color = Color::rgb(255, 0, 0);
const BLUE: Color = Color::rgb(0, 0, 255);
const GREEN_HALF: Color = Color::rgba(0, 255, 0, 128);

fn px(scene: &Scene, vp: NodeId, x: u32, y: u32) -> [u8; 4] {
    scene.pixels(vp).unwrap().get_pixel(x, y).0
}

/// Root 64x64 on white, a fill at (4,4) and a half-opaque viewport at
/// (20,20) holding a translucent fill.
struct Fixture {
    scene: Scene,
    fill: NodeId,
    vp: NodeId,
    inner: NodeId,
}

fn fixture() -> Fixture {
    let mut scene = Scene::new(Size::new(64, 64));
    let root = scene.root();
    scene.begin_update();
    scene
        .set_style(root, Style::default().with_background(WHITE))
        .unwrap();
    let fill = scene
        .add_child(root, NodeKind::Fill(RED), Rect::new(4, 4, 10, 10))
        .unwrap();
    let vp = scene.add_viewport(root, Rect::new(20, 20, 30, 30)).unwrap();
    scene
        .set_style(vp, Style::default().with_background(BLUE).with_opacity(0.5))
        .unwrap();
    let inner = scene
        .add_child(vp, NodeKind::Fill(GREEN_HALF), Rect::new(5, 5, 10, 10))
        .unwrap();
    scene.end_update().unwrap();
    Fixture {
        scene,
        fill,
        vp,
        inner,
    }
}

#[test]
fn batched_updates_render_once_at_the_end() {
    let mut scene = Scene::new(Size::new(8, 8));
    let root = scene.root();
    scene.begin_update();
    let report = scene.set_style(root, Style::default().with_background(RED)).unwrap();
    assert!(report.is_empty());
    assert_eq!(px(&scene, root, 0, 0), [0, 0, 0, 0]);

    let report = scene.end_update().unwrap();
    assert_eq!(report.full, vec![root]);
    assert_eq!(report.dirty, Some(Rect::new(0, 0, 8, 8)));
    assert!(!report.presented);
    assert_eq!(px(&scene, root, 0, 0), [255, 0, 0, 255]);
}

#[test]
fn structural_change_re_renders_nested_viewports() {
    let Fixture { mut scene, fill, vp, .. } = fixture();
    let root = scene.root();

    let report = scene.set_rect(fill, Rect::new(2, 2, 6, 6)).unwrap();
    assert_eq!(report.full, vec![vp, root]);
    assert_eq!(report.composited, vec![vp]);
    assert_eq!(px(&scene, root, 2, 2), [255, 0, 0, 255]);
    assert_eq!(px(&scene, root, 12, 12), [255, 255, 255, 255]);

    let before = scene.pixels(root).unwrap().clone();
    scene.render().unwrap();
    assert_eq!(scene.pixels(root).unwrap(), &before);
}

#[test]
fn structural_change_inside_viewport_composites_above_backing() {
    let Fixture { mut scene, vp, .. } = fixture();
    let root = scene.root();

    scene
        .add_child(vp, NodeKind::Fill(RED), Rect::new(0, 0, 2, 2))
        .unwrap();
    let report = scene.last_report().clone();
    assert_eq!(report.full, vec![vp]);
    assert_eq!(report.composited, vec![vp]);
    assert_eq!(report.dirty, Some(Rect::new(20, 20, 30, 30)));

    let incremental = scene.pixels(root).unwrap().clone();
    scene.render().unwrap();
    assert_eq!(scene.pixels(root).unwrap(), &incremental);
}

#[test]
fn cosmetic_fill_change_touches_only_its_box() {
    let Fixture { mut scene, fill, .. } = fixture();
    let root = scene.root();
    let before = scene.pixels(root).unwrap().clone();

    let report = scene.set_fill(fill, Color::rgb(0, 0, 0)).unwrap();
    assert_eq!(report.isolated, vec![fill]);
    assert!(report.full.is_empty());
    assert_eq!(report.dirty, Some(Rect::new(4, 4, 10, 10)));

    let after = scene.pixels(root).unwrap();
    let bbox = Rect::new(4, 4, 10, 10);
    for (x, y, p) in after.enumerate_pixels() {
        if bbox.contains(Point::new(x as i32, y as i32)) {
            assert_eq!(p.0, [0, 0, 0, 255]);
        } else {
            assert_eq!(p, before.get_pixel(x, y), "pixel ({x},{y}) changed");
        }
    }
}

#[test]
fn cosmetic_change_on_wrong_kind_is_rejected() {
    let Fixture { mut scene, vp, .. } = fixture();
    assert!(matches!(
        scene.set_fill(vp, RED),
        Err(SceneError::WrongKind { expected: "fill", .. })
    ));
    assert!(matches!(
        scene.set_image(vp, RgbaImage::new(1, 1)),
        Err(SceneError::WrongKind { expected: "image", .. })
    ));
}

#[test]
fn frame_cosmetic_restyles_subtree_and_renders_viewport() {
    let mut scene = Scene::new(Size::new(16, 16));
    let root = scene.root();
    let frame = scene
        .add_child(root, NodeKind::Frame, Rect::new(0, 0, 8, 8))
        .unwrap();
    let fill = scene
        .add_child(frame, NodeKind::Fill(RED), Rect::new(0, 0, 4, 4))
        .unwrap();

    let report = scene
        .set_style(frame, Style::default().with_opacity(0.5))
        .unwrap();
    assert_eq!(report.restyled, vec![frame]);
    assert_eq!(report.full, vec![root]);
    assert!(report.isolated.is_empty());

    assert_eq!(scene.node(fill).unwrap().computed_style().opacity, 0.5);
    assert_eq!(px(&scene, root, 1, 1), [255, 0, 0, 128]);
}

#[test]
fn frames_clip_their_children() {
    let mut scene = Scene::new(Size::new(16, 16));
    let root = scene.root();
    let frame = scene
        .add_child(root, NodeKind::Frame, Rect::new(0, 0, 4, 4))
        .unwrap();
    scene
        .add_child(frame, NodeKind::Fill(RED), Rect::new(0, 0, 8, 8))
        .unwrap();

    assert_eq!(px(&scene, root, 3, 3), [255, 0, 0, 255]);
    assert_eq!(px(&scene, root, 5, 5), [0, 0, 0, 0]);
}

#[test]
fn repeated_cosmetic_renders_are_stable() {
    let Fixture {
        mut scene,
        vp,
        inner,
        ..
    } = fixture();
    let root = scene.root();

    scene.set_fill(inner, GREEN_HALF).unwrap();
    let once = scene.pixels(root).unwrap().clone();
    let once_vp = scene.pixels(vp).unwrap().clone();

    for _ in 0..4 {
        let report = scene.set_fill(inner, GREEN_HALF).unwrap();
        assert_eq!(report.isolated, vec![inner]);
        assert_eq!(report.composited, vec![vp]);
    }
    assert_eq!(scene.pixels(root).unwrap(), &once);
    assert_eq!(scene.pixels(vp).unwrap(), &once_vp);

    // Same bytes as painting everything from scratch.
    scene.render().unwrap();
    assert_eq!(scene.pixels(root).unwrap(), &once);
}

#[test]
fn viewport_opacity_change_reuses_backing() {
    let Fixture { mut scene, vp, .. } = fixture();
    let root = scene.root();
    assert!(scene.backing(vp).unwrap().is_some());

    let report = scene
        .set_style(vp, Style::default().with_background(BLUE))
        .unwrap();
    assert_eq!(report.isolated, vec![vp]);
    assert_eq!(report.full, vec![vp]);
    assert_eq!(px(&scene, root, 21, 21), [0, 0, 255, 255]);

    let report = scene
        .set_style(vp, Style::default().with_background(BLUE).with_opacity(0.5))
        .unwrap();
    assert_eq!(report.composited, vec![vp]);
    let half = scene.pixels(root).unwrap().clone();
    scene.render().unwrap();
    assert_eq!(scene.pixels(root).unwrap(), &half);
}

#[test]
fn hiding_and_showing_a_viewport_restores_what_was_beneath() {
    let Fixture { mut scene, vp, .. } = fixture();
    let root = scene.root();
    let shown = scene.pixels(root).unwrap().clone();
    let style = *scene.node(vp).unwrap().style();

    scene.set_style(vp, style.hidden()).unwrap();
    assert_eq!(px(&scene, root, 25, 25), [255, 255, 255, 255]);

    scene.set_style(vp, style).unwrap();
    assert_eq!(scene.pixels(root).unwrap(), &shown);
}

#[test]
fn hit_test_finds_topmost_visible_node() {
    let Fixture {
        mut scene,
        fill,
        vp,
        inner,
    } = fixture();
    let root = scene.root();

    assert_eq!(scene.hit_test(Point::new(5, 5)), Some(fill));
    assert_eq!(scene.hit_test(Point::new(0, 0)), Some(root));
    // Inner fill sits at (5,5) inside the viewport at (20,20).
    assert_eq!(scene.hit_test(Point::new(26, 26)), Some(inner));
    assert_eq!(scene.hit_test(Point::new(45, 45)), Some(vp));
    assert_eq!(scene.hit_test(Point::new(64, 10)), None);

    scene
        .set_style(inner, Style::default().hidden())
        .unwrap();
    assert_eq!(scene.hit_test(Point::new(26, 26)), Some(vp));
}

#[test]
fn hit_test_respects_clipping_by_ancestors() {
    let mut scene = Scene::new(Size::new(32, 32));
    let root = scene.root();
    let frame = scene
        .add_child(root, NodeKind::Frame, Rect::new(0, 0, 8, 8))
        .unwrap();
    let big = scene
        .add_child(frame, NodeKind::Fill(RED), Rect::new(0, 0, 20, 20))
        .unwrap();

    assert_eq!(scene.hit_test(Point::new(4, 4)), Some(big));
    assert_eq!(scene.hit_test(Point::new(12, 12)), Some(root));
}

#[test]
fn moving_a_viewport_moves_its_window_boxes() {
    let Fixture {
        mut scene, vp, inner, ..
    } = fixture();
    scene.set_rect(vp, Rect::new(30, 10, 30, 30)).unwrap();
    assert_eq!(scene.node(vp).unwrap().win_bbox(), Rect::new(30, 10, 30, 30));
    assert_eq!(
        scene.node(inner).unwrap().win_bbox(),
        Rect::new(35, 15, 10, 10)
    );
    assert_eq!(scene.node(inner).unwrap().rect(), Rect::new(5, 5, 10, 10));
}

#[test]
fn empty_viewports_are_skipped() {
    let mut scene = Scene::new(Size::new(16, 16));
    let root = scene.root();
    let empty = scene.add_viewport(root, Rect::new(2, 2, 0, 5)).unwrap();
    assert_eq!(scene.last_report().skipped, vec![empty]);
    assert_eq!(scene.last_report().full, vec![root]);

    let report = scene.resize_viewport(root, Size::zero()).unwrap();
    assert_eq!(report.skipped, vec![root]);
    assert!(report.full.is_empty());
    assert_eq!(report.dirty, None);
}

#[test]
fn reorder_and_remove_change_paint_order() {
    let mut scene = Scene::new(Size::new(16, 16));
    let root = scene.root();
    let a = scene
        .add_child(root, NodeKind::Fill(RED), Rect::new(0, 0, 8, 8))
        .unwrap();
    let b = scene
        .add_child(root, NodeKind::Fill(BLUE), Rect::new(4, 4, 8, 8))
        .unwrap();
    assert_eq!(px(&scene, root, 5, 5), [0, 0, 255, 255]);

    scene.reorder(a, 5).unwrap();
    assert_eq!(scene.children(root).unwrap(), &[b, a]);
    assert_eq!(px(&scene, root, 5, 5), [255, 0, 0, 255]);

    scene.remove(a).unwrap();
    assert_eq!(px(&scene, root, 5, 5), [0, 0, 255, 255]);
    assert_eq!(px(&scene, root, 1, 1), [0, 0, 0, 0]);
    assert!(matches!(scene.node(a), Err(SceneError::UnknownNode(_))));
    assert!(matches!(scene.remove(root), Err(SceneError::Root)));
    assert!(matches!(
        scene.add_child(a, NodeKind::Frame, Rect::default()),
        Err(SceneError::UnknownNode(_))
    ));
}

#[test]
fn queries_reject_non_viewports() {
    let Fixture { scene, fill, vp, .. } = fixture();
    assert!(matches!(scene.pixels(fill), Err(SceneError::NotAViewport(_))));
    assert_eq!(scene.enclosing_viewport(fill).unwrap(), Some(scene.root()));
    assert_eq!(scene.enclosing_viewport(scene.root()).unwrap(), None);
    assert_eq!(scene.pixels(vp).unwrap().dimensions(), (30, 30));
}

#[test]
fn attached_window_shows_root_pixels() {
    let ctx = EngineCtx::headless(EngineConfig::default()).unwrap();
    let session = WindowSession::open(
        &ctx,
        PlatformWindow::Headless(HeadlessWindow::new("scene")),
        &WindowOptions::new("scene", Size::new(64, 64)),
    )
    .unwrap();

    let Fixture {
        mut scene, fill, ..
    } = fixture();
    let report = scene.attach(session.clone()).unwrap();
    assert!(report.presented);

    let report = scene.set_fill(fill, BLUE).unwrap();
    assert!(report.presented);

    let s = session.surface_id();
    let shown = session
        .executor()
        .run(move |gpu| gpu.read_surface(s))
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(&shown, scene.pixels(scene.root()).unwrap());
    assert_eq!(*shown.get_pixel(5, 5), Rgba([0, 0, 255, 255]));

    session.close().unwrap();
    let report = scene.set_fill(fill, RED).unwrap();
    assert!(!report.presented);
}
