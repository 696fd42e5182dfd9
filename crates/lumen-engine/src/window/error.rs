use crate::device::GpuError;
use crate::exec::ExecutorError;
use crate::texture::TextureError;

#[derive(Debug, thiserror::Error)]
pub enum WindowError {
    /// The session is closing or closed; the request was not executed.
    #[error("window session is closed")]
    Closed,

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Gpu(#[from] GpuError),

    #[error(transparent)]
    Texture(#[from] TextureError),

    #[error("platform window: {0}")]
    Platform(String),
}
