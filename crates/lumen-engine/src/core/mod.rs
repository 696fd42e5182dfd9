//! Core engine-facing contracts.
//!
//! The explicit engine context replaces process-wide globals; the `App` trait
//! is the interface between the runtime and higher layers (ui, studio).

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::{EngineConfig, EngineCtx};
