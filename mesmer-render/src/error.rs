use std::path::PathBuf;

use thiserror::Error;

/// Errors originating from GPU orchestration and pre-rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to read shader {path}: {source}")]
    ShaderIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} shader failed to compile: {log}")]
    ShaderCompile { stage: &'static str, log: String },

    #[error("shader program failed to link: {0}")]
    ProgramLink(String),

    #[error("failed to allocate {0}")]
    ResourceAllocation(String),

    #[error("framebuffer incomplete (status 0x{0:04x})")]
    FramebufferIncomplete(u32),

    #[error("no fractal kind selected for this operation")]
    InvalidFractalKind,

    #[error("invalid tile size: {0}×{0} (must be > 0)")]
    InvalidTileSize(u32),

    #[error("invalid pre-render resolution: {0}")]
    InvalidResolution(u32),

    #[error("GPU fence wait failed")]
    FenceFailed,

    #[error("a pre-render job is already in flight")]
    WorkerBusy,

    #[error("no shared rendering context is available for pre-rendering")]
    WorkerContextUnavailable,

    #[error("failed to activate the worker context: {0}")]
    ContextActivation(String),

    #[error("failed to spawn the pre-render worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("the pre-render worker panicked")]
    WorkerPanicked,

    #[error("nothing to export: no pre-rendered texture is being shown")]
    NothingToExport,

    #[error("export failed: {0}")]
    Export(String),

    #[error(transparent)]
    Core(#[from] mesmer_core::CoreError),
}
