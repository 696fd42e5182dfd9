/// Failure reported by the centralized post-call check.
///
/// Always fatal: once raised, the owning [`Gpu`](super::Gpu) refuses every
/// later call with a clone of this error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("GPU call `{op}` failed: {message}")]
pub struct GpuError {
    pub op: &'static str,
    pub message: String,
}

/// High-level response after a surface acquisition error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface was reconfigured; rendering may resume next frame.
    Reconfigured,
    /// Transient error; skip the current frame.
    SkipFrame,
    /// Fatal error (commonly OOM).
    Fatal,
}
