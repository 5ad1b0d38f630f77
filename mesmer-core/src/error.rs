use thiserror::Error;

/// Errors originating from the core viewport and parameter model.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid zoom: {0} (must be positive and finite)")]
    InvalidZoom(f64),

    #[error("no fractal kind selected")]
    NoFractalKind,

    #[error("unknown fractal kind: {0:?}")]
    UnknownFractalKind(String),

    #[error("malformed vector {value:?}: expected {expected} comma-separated numbers")]
    MalformedVector { value: String, expected: usize },

    #[error("malformed value for {key}: {value:?}")]
    MalformedValue { key: String, value: String },
}
