//! PNG export of a baked texture with embedded metadata (tEXt chunks).

use std::io::BufWriter;
use std::path::Path;

use mesmer_core::{FractalKind, FractalParams, PaletteParams, PreRenderInputs};
use serde::Serialize;
use tracing::debug;

use crate::error::RenderError;
use crate::Result;

/// Keyword of the chunk holding [`ExportMetadata`] as JSON.
pub const PARAMETERS_KEYWORD: &str = "Mesmer.Parameters";

/// Everything needed to reproduce an exported image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportMetadata {
    pub kind: FractalKind,
    pub center: (f64, f64),
    pub zoom: f64,
    pub max_iterations: u32,
    pub params: FractalParams,
    pub palette: PaletteParams,
    pub resolution: u32,
}

impl ExportMetadata {
    pub fn from_inputs(inputs: &PreRenderInputs) -> Self {
        Self {
            kind: inputs.kind,
            center: inputs.center,
            zoom: inputs.zoom,
            max_iterations: inputs.max_iterations,
            params: inputs.params,
            palette: inputs.palette,
            resolution: inputs.resolution,
        }
    }

    fn description(&self) -> String {
        format!(
            "{} - Center: {} {}i, Zoom: {}, Iterations: {}",
            self.kind, self.center.0, self.center.1, self.zoom, self.max_iterations,
        )
    }
}

/// Write a square RGBA8 buffer as PNG.
///
/// `pixels` is in GPU order (bottom row first) and is flipped on the way
/// out so the file is upright.
pub fn export_png(pixels: &[u8], size: u32, path: &Path, metadata: &ExportMetadata) -> Result<()> {
    let row_bytes = size as usize * 4;
    if pixels.len() != row_bytes * size as usize {
        return Err(RenderError::Export(format!(
            "expected {} bytes for {size}×{size}, got {}",
            row_bytes * size as usize,
            pixels.len()
        )));
    }
    let file = std::fs::File::create(path)
        .map_err(|e| RenderError::Export(format!("failed to create {}: {e}", path.display())))?;
    let writer = BufWriter::new(file);

    let mut encoder = png::Encoder::new(writer, size, size);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Default);

    let json = serde_json::to_string(metadata)
        .map_err(|e| RenderError::Export(format!("failed to encode parameters: {e}")))?;
    for (keyword, text) in [
        ("Software", "Mesmer".to_string()),
        ("Description", metadata.description()),
        (PARAMETERS_KEYWORD, json),
    ] {
        encoder
            .add_text_chunk(keyword.to_string(), text)
            .map_err(|e| RenderError::Export(format!("failed to add text chunk '{keyword}': {e}")))?;
    }

    let mut png_writer = encoder
        .write_header()
        .map_err(|e| RenderError::Export(format!("failed to write PNG header: {e}")))?;

    let upright: Vec<u8> = pixels
        .chunks_exact(row_bytes)
        .rev()
        .flatten()
        .copied()
        .collect();
    png_writer
        .write_image_data(&upright)
        .map_err(|e| RenderError::Export(format!("failed to write PNG image data: {e}")))?;

    debug!("Exported PNG {}x{} to {}", size, size, path.display());
    Ok(())
}
