//! PNG export of viewport pixels.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageError};

use crate::error::SceneError;
use crate::node::NodeId;
use crate::scene::Scene;

impl Scene {
    /// Writes viewport `vp` as an RGBA PNG.
    pub fn write_png<W: Write>(&self, vp: NodeId, out: W) -> Result<(), SceneError> {
        let pixels = self.pixels(vp)?;
        PngEncoder::new(out)
            .write_image(
                pixels.as_raw(),
                pixels.width(),
                pixels.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(SceneError::Encode)
    }

    pub fn save_png(&self, vp: NodeId, path: impl AsRef<Path>) -> Result<(), SceneError> {
        let path = path.as_ref();
        let io_err = |source: std::io::Error| SceneError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = File::create(path).map_err(io_err)?;
        let mut out = BufWriter::new(file);
        self.write_png(vp, &mut out).map_err(|e| match e {
            SceneError::Encode(ImageError::IoError(source)) => io_err(source),
            other => other,
        })?;
        out.flush().map_err(io_err)?;
        log::info!("saved viewport {vp:?} to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use lumen_engine::coords::{Rect, Size};
    use lumen_engine::paint::Color;

    use super::*;
    use crate::node::NodeKind;

    fn scene() -> (Scene, NodeId) {
        let mut scene = Scene::new(Size::new(12, 8));
        let root = scene.root();
        let vp = scene.add_viewport(root, Rect::new(2, 2, 6, 4)).unwrap();
        scene
            .add_child(vp, NodeKind::Fill(Color::rgba(10, 20, 30, 200)), Rect::new(0, 0, 3, 4))
            .unwrap();
        (scene, vp)
    }

    #[test]
    fn png_round_trips_viewport_pixels() {
        let (scene, vp) = scene();
        let mut bytes = Vec::new();
        scene.write_png(vp, &mut bytes).unwrap();

        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(&decoded, scene.pixels(vp).unwrap());
    }

    #[test]
    fn save_png_reports_the_path_on_failure() {
        let (scene, vp) = scene();
        let path = std::env::temp_dir()
            .join("lumen-no-such-dir")
            .join("out.png");
        match scene.save_png(vp, &path) {
            Err(SceneError::Io { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn save_png_writes_a_readable_file() {
        let (scene, _) = scene();
        let path = std::env::temp_dir().join(format!("lumen-save-{}.png", std::process::id()));
        scene.save_png(scene.root(), &path).unwrap();

        let decoded = image::open(&path).unwrap().to_rgba8();
        std::fs::remove_file(&path).ok();
        assert_eq!(&decoded, scene.pixels(scene.root()).unwrap());
    }
}
