//! # bf-av
//!
//! Audio tooling for the bookforge pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support for running external processes.
//! - **Scoped directories** ([`ScopedDir`]) -- per-job scratch directories
//!   that are removed on every exit path.
//! - **Engine seam** ([`Engine`], [`EngineInvocation`]) -- an immutable
//!   description of one mux run and the narrow capability that executes it,
//!   with [`FfmpegEngine`] as the production implementation.

pub mod command;
pub mod engine;
pub mod ffmpeg;
pub mod invocation;
pub mod tools;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use engine::Engine;
pub use ffmpeg::FfmpegEngine;
pub use invocation::{
    concat_filter, EngineInput, EngineInputPlan, EngineInvocation, InputRole, OutputSpec,
    CONCAT_LABEL,
};
pub use tools::{ToolInfo, ToolRegistry};
pub use workspace::ScopedDir;
