//! Shader sources and the RAII program handle.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use mesmer_core::{FractalKind, UniformSet, UniformValue};
use tracing::{debug, error};

use crate::error::RenderError;
use crate::gpu::Gpu;
use crate::Result;

/// Define injected into the fractal shader for the tiled pre-render variant.
pub const PRERENDER_DEFINE: &str = "PRERENDER";

/// GLSL text plus a label for log messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub label: String,
    pub text: String,
}

impl ShaderSource {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| RenderError::ShaderIo {
            path: path.to_path_buf(),
            source,
        })?;
        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { label, text })
    }

    /// Copy of this source with `#define`s inserted right after the
    /// `#version` line (or at the top when there is none).
    pub fn with_defines(&self, defines: &[&str]) -> Self {
        let block: String = defines.iter().map(|d| format!("#define {d}\n")).collect();
        let text = match self.text.find('\n') {
            Some(eol) if self.text.trim_start().starts_with("#version") => {
                let (head, tail) = self.text.split_at(eol + 1);
                format!("{head}{block}{tail}")
            }
            _ => format!("{block}{}", self.text),
        };
        let label = if defines.is_empty() {
            self.label.clone()
        } else {
            format!("{}[{}]", self.label, defines.join(","))
        };
        Self { label, text }
    }
}

/// Every shader the explorer uses, loaded once at startup.
#[derive(Debug, Clone)]
pub struct ShaderLibrary {
    pub quad_vertex: ShaderSource,
    pub fractal_fragment: ShaderSource,
    pub background_fragment: ShaderSource,
    pub loading_fragment: ShaderSource,
    pub viewer_fragment: ShaderSource,
}

impl ShaderLibrary {
    /// Read all shaders from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = |name: &str| -> PathBuf { dir.join(name) };
        let library = Self {
            quad_vertex: ShaderSource::load(&path("quad.vert"))?,
            fractal_fragment: ShaderSource::load(&path("fractal.frag"))?,
            background_fragment: ShaderSource::load(&path("background.frag"))?,
            loading_fragment: ShaderSource::load(&path("loading.frag"))?,
            viewer_fragment: ShaderSource::load(&path("viewer.frag"))?,
        };
        debug!(dir = %dir.display(), "Loaded shader library");
        Ok(library)
    }

    /// Fragment source specialised for `kind`, optionally as the tiled
    /// pre-render variant.
    pub fn fractal_variant(&self, kind: FractalKind, prerender: bool) -> Result<ShaderSource> {
        if kind == FractalKind::None {
            return Err(RenderError::InvalidFractalKind);
        }
        let mut defines = vec![kind.shader_define()];
        if prerender {
            defines.push(PRERENDER_DEFINE);
        }
        Ok(self.fractal_fragment.with_defines(&defines))
    }
}

/// A linked program, deleted when dropped.
pub struct ShaderProgram<G: Gpu> {
    gpu: Rc<G>,
    raw: G::Program,
    label: String,
}

impl<G: Gpu> ShaderProgram<G> {
    /// Compile and link. Failures are logged with the driver's message.
    pub fn new(gpu: &Rc<G>, vertex: &ShaderSource, fragment: &ShaderSource) -> Result<Self> {
        match gpu.create_program(&vertex.text, &fragment.text) {
            Ok(raw) => {
                debug!(vertex = %vertex.label, fragment = %fragment.label, "Shader program linked");
                Ok(Self {
                    gpu: Rc::clone(gpu),
                    raw,
                    label: fragment.label.clone(),
                })
            }
            Err(e) => {
                error!(vertex = %vertex.label, fragment = %fragment.label, "Shader program failed: {e}");
                Err(e)
            }
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn activate(&self) {
        self.gpu.use_program(Some(self.raw));
    }

    /// Set one uniform; the program must be active.
    pub fn set(&self, name: &str, value: UniformValue) {
        self.gpu.set_uniform(self.raw, name, value);
    }

    /// Activate and assign every uniform in `uniforms`.
    pub fn apply(&self, uniforms: &UniformSet) {
        self.activate();
        for (name, value) in uniforms.iter() {
            self.gpu.set_uniform(self.raw, name, value);
        }
    }
}

impl<G: Gpu> Drop for ShaderProgram<G> {
    fn drop(&mut self) {
        self.gpu.use_program(None);
        self.gpu.delete_program(self.raw);
        debug!(program = %self.label, "Shader program released");
    }
}

impl<G: Gpu> std::fmt::Debug for ShaderProgram<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("raw", &self.raw)
            .field("label", &self.label)
            .finish()
    }
}
