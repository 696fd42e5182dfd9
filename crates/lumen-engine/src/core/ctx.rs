use anyhow::Result;

use crate::device::{GpuBackend, GpuInit, HeadlessBackend, WgpuBackend};
use crate::exec::RenderExecutor;

/// Engine-wide settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub gpu: GpuInit,
    /// Name of the render executor thread.
    pub executor_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gpu: GpuInit::default(),
            executor_name: "lumen-render".to_string(),
        }
    }
}

/// Explicit engine context, built once at startup and handed to every
/// component that needs the render thread.
#[derive(Clone)]
pub struct EngineCtx {
    executor: RenderExecutor,
    config: EngineConfig,
}

impl EngineCtx {
    /// Starts the render executor over the wgpu device.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let init = config.gpu.clone();
        let executor = RenderExecutor::spawn(&config.executor_name, init.sampler, move || {
            Ok(Box::new(WgpuBackend::new(init)?) as Box<dyn GpuBackend>)
        })?;
        Ok(Self { executor, config })
    }

    /// Same executor and bookkeeping over the in-memory device. Windows opened
    /// from this context must be headless.
    pub fn headless(config: EngineConfig) -> Result<Self> {
        let executor = RenderExecutor::spawn(&config.executor_name, config.gpu.sampler, || {
            Ok(Box::new(HeadlessBackend::new()) as Box<dyn GpuBackend>)
        })?;
        Ok(Self { executor, config })
    }

    pub fn executor(&self) -> &RenderExecutor {
        &self.executor
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
