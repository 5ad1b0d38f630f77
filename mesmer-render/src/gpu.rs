//! The narrow slice of a GPU API the explorer needs.
//!
//! Everything above this trait (mode switching, tiling, fence gating) is
//! written against [`Gpu`] so it runs the same on an OpenGL context and on
//! the counting [`crate::headless::HeadlessGpu`] used by the tests.

use std::fmt::Debug;
use std::time::Duration;

use mesmer_core::UniformValue;

use crate::Result;

/// Pixel rectangle with the origin at the bottom-left, as GL expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle covering `width`×`height` from the origin.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }
}

/// Result of waiting on a fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceStatus {
    /// All commands issued before the fence have completed.
    Signaled,
    /// The timeout elapsed first. The fence is still valid.
    TimedOut,
    /// The driver reported an error; the fence will never signal.
    Failed,
}

/// Completeness of a framebuffer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramebufferStatus {
    Complete,
    /// Raw status code reported by the driver.
    Incomplete(u32),
}

/// Shader stage, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn label(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
        }
    }
}

/// A current GPU context.
///
/// Handles are plain values; ownership is tracked by the RAII wrappers in
/// this crate. Handles that cross threads (textures, framebuffers, buffers,
/// fences) must be `Send`; they are only ever used on contexts that share
/// objects with the one that created them.
pub trait Gpu {
    type Program: Copy + Debug + Send + 'static;
    type Buffer: Copy + Debug + Send + 'static;
    type VertexArray: Copy + Debug;
    type Texture: Copy + Debug + Send + 'static;
    type Framebuffer: Copy + Debug + Send + 'static;
    type Fence: Debug + Send + 'static;

    // Programs

    /// Compile and link a program from GLSL source.
    fn create_program(&self, vertex_src: &str, fragment_src: &str) -> Result<Self::Program>;
    fn delete_program(&self, program: Self::Program);
    fn use_program(&self, program: Option<Self::Program>);
    /// Assign a uniform of the currently used `program`. Unknown names are ignored.
    fn set_uniform(&self, program: Self::Program, name: &str, value: UniformValue);

    // Geometry

    /// Upload the full-screen quad: returns `(vertices, indices)`.
    fn create_quad_buffers(&self) -> Result<(Self::Buffer, Self::Buffer)>;
    fn delete_buffer(&self, buffer: Self::Buffer);
    /// Vertex arrays are per-context, so each context builds its own over
    /// the shared buffers.
    fn create_vertex_array(
        &self,
        vertices: Self::Buffer,
        indices: Self::Buffer,
    ) -> Result<Self::VertexArray>;
    fn delete_vertex_array(&self, vao: Self::VertexArray);
    fn draw_quad(&self, vao: Self::VertexArray);

    // Textures and framebuffers

    fn max_texture_size(&self) -> u32;
    /// Allocate a square RGBA8 texture with a full mip chain.
    fn create_texture(&self, size: u32) -> Result<Self::Texture>;
    fn delete_texture(&self, texture: Self::Texture);
    fn bind_texture(&self, unit: u32, texture: Option<Self::Texture>);
    fn generate_mipmaps(&self, texture: Self::Texture);
    /// Read back level 0 as tightly packed RGBA8, bottom row first.
    fn read_texture_rgba(&self, texture: Self::Texture, size: u32) -> Result<Vec<u8>>;

    /// Create a framebuffer with `texture` as its single color attachment.
    fn create_framebuffer(&self, texture: Self::Texture) -> Result<Self::Framebuffer>;
    fn framebuffer_status(&self, framebuffer: Self::Framebuffer) -> FramebufferStatus;
    fn bind_framebuffer(&self, framebuffer: Option<Self::Framebuffer>);
    fn delete_framebuffer(&self, framebuffer: Self::Framebuffer);

    // Rasterizer state

    fn set_viewport(&self, rect: Rect);
    /// `None` disables the scissor test.
    fn set_scissor(&self, rect: Option<Rect>);
    fn clear(&self, rgba: [f32; 4]);

    // Synchronisation

    fn flush(&self);
    /// Insert a fence after every command issued so far.
    fn create_fence(&self) -> Result<Self::Fence>;
    /// Block for at most `timeout` waiting for `fence`. Flushes first.
    fn client_wait(&self, fence: &Self::Fence, timeout: Duration) -> FenceStatus;
    fn delete_fence(&self, fence: Self::Fence);
}

/// A secondary context that shares objects with the main one and can be
/// made current on another thread.
///
/// The pre-render worker receives the context by value, activates it, and
/// hands it back once submission is finished.
pub trait SharedContext: Send + 'static {
    type Gpu: Gpu;

    /// Make the context current on the calling thread.
    fn make_current(&mut self) -> Result<Self::Gpu>;

    /// Detach the context from the calling thread. Every value returned by
    /// [`SharedContext::make_current`] has been dropped by then.
    fn release(&mut self);
}
