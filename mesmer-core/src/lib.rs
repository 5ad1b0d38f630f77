pub mod error;
pub mod fractal;
pub mod input;
pub mod iteration;
pub mod palette;
pub mod uniforms;
pub mod viewport;

// Re-export primary types for convenience.
pub use error::CoreError;
pub use fractal::{FractalKind, FractalParams, KindInfo};
pub use input::{InputEvent, Key, MouseButton};
pub use iteration::IterationPolicy;
pub use palette::{PaletteParams, PaletteSet};
pub use uniforms::{FrameInputs, PreRenderInputs, UniformSet, UniformValue};
pub use viewport::{ScreenSize, ViewportState};

/// Convenience result type for the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;
