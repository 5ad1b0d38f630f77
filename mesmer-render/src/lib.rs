pub mod error;
pub mod export;
pub mod fence;
pub mod gpu;
pub mod headless;
pub mod prerender;
pub mod quad;
pub mod session;
pub mod shader;
pub mod tile;
pub mod viewer;

pub use error::RenderError;
pub use export::{export_png, ExportMetadata};
pub use gpu::{FenceStatus, FramebufferStatus, Gpu, Rect, ShaderStage, SharedContext};
pub use prerender::{BakedTexture, JobState, PreRenderJob, PreRenderPoll, PreRenderProgress, PreRenderer};
pub use quad::{QuadBuffers, QuadMesh};
pub use session::{Explorer, Mode, PreRenderOverride, PreRenderSettings, Response};
pub use shader::{ShaderLibrary, ShaderProgram, ShaderSource};
pub use tile::{build_tile_grid, Tile, DEFAULT_TILE_SIZE};
pub use viewer::TextureViewer;

/// Convenience result type for the render crate.
pub type Result<T> = std::result::Result<T, RenderError>;
