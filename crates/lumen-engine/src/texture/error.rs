use std::path::PathBuf;

use crate::device::GpuError;

#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    /// Unsupported or corrupt image data.
    #[error("failed to decode image")]
    Decode(#[source] image::ImageError),

    #[error("failed to read `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A normalized buffer is not packed `width * 4` RGBA. Points at a decoder
    /// defect rather than caller misuse.
    #[error("pixel buffer of {len} bytes is not packed RGBA for {width}x{height}")]
    Format { width: u32, height: u32, len: usize },

    #[error(transparent)]
    Gpu(#[from] GpuError),
}
