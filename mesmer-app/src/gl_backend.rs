//! OpenGL implementation of [`Gpu`] over `glow`, plus the worker's shared
//! glutin context.

use std::sync::Arc;
use std::time::Duration;

use glow::{HasContext, PixelPackData};
use glutin::context::{NotCurrentContext, NotCurrentGlContext, PossiblyCurrentContext};
use glutin::display::{GetGlDisplay, GlDisplay};
use glutin::prelude::PossiblyCurrentGlContext;
use mesmer_core::UniformValue;
use mesmer_render::{
    FenceStatus, FramebufferStatus, Gpu, Rect, RenderError, Result, ShaderStage, SharedContext,
};
use tracing::{debug, warn};

/// Full-screen quad in normalized device coordinates.
const QUAD_VERTICES: [f32; 8] = [-1.0, -1.0, 1.0, -1.0, 1.0, 1.0, -1.0, 1.0];
const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

/// Longest single `client_wait_sync` call; the API takes an `i32` of nanoseconds.
const MAX_WAIT_NANOS: u128 = i32::MAX as u128;

/// Convert a `u32` to `i32` for GL API calls, saturating.
fn gl_size(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// A GL sync object. Sync objects are shared between contexts, so the
/// handle may be waited on from whichever thread holds a sharing context.
#[derive(Debug)]
pub struct GlFence(glow::Fence);

// SAFETY: a GLsync is an opaque server-side name, valid in every context of
// the share group regardless of the thread that created it.
unsafe impl Send for GlFence {}

/// A current GL context seen through `glow`.
pub struct GlowGpu {
    gl: Arc<glow::Context>,
}

impl GlowGpu {
    pub fn new(gl: Arc<glow::Context>) -> Self {
        Self { gl }
    }

    fn compile(&self, stage: ShaderStage, source: &str) -> Result<glow::Shader> {
        let kind = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        unsafe {
            let shader = self
                .gl
                .create_shader(kind)
                .map_err(RenderError::ResourceAllocation)?;
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            if !self.gl.get_shader_compile_status(shader) {
                let log = self.gl.get_shader_info_log(shader);
                self.gl.delete_shader(shader);
                return Err(RenderError::ShaderCompile {
                    stage: stage.label(),
                    log,
                });
            }
            Ok(shader)
        }
    }
}

impl Gpu for GlowGpu {
    type Program = glow::Program;
    type Buffer = glow::Buffer;
    type VertexArray = glow::VertexArray;
    type Texture = glow::Texture;
    type Framebuffer = glow::Framebuffer;
    type Fence = GlFence;

    fn create_program(&self, vertex_src: &str, fragment_src: &str) -> Result<glow::Program> {
        let vertex = self.compile(ShaderStage::Vertex, vertex_src)?;
        let fragment = match self.compile(ShaderStage::Fragment, fragment_src) {
            Ok(shader) => shader,
            Err(e) => {
                unsafe { self.gl.delete_shader(vertex) };
                return Err(e);
            }
        };

        unsafe {
            let program = match self.gl.create_program() {
                Ok(program) => program,
                Err(e) => {
                    self.gl.delete_shader(vertex);
                    self.gl.delete_shader(fragment);
                    return Err(RenderError::ResourceAllocation(e));
                }
            };
            self.gl.attach_shader(program, vertex);
            self.gl.attach_shader(program, fragment);
            self.gl.link_program(program);
            let linked = self.gl.get_program_link_status(program);
            let log = if linked {
                String::new()
            } else {
                self.gl.get_program_info_log(program)
            };

            self.gl.detach_shader(program, vertex);
            self.gl.detach_shader(program, fragment);
            self.gl.delete_shader(vertex);
            self.gl.delete_shader(fragment);

            if !linked {
                self.gl.delete_program(program);
                return Err(RenderError::ProgramLink(log));
            }
            Ok(program)
        }
    }

    fn delete_program(&self, program: glow::Program) {
        unsafe { self.gl.delete_program(program) };
    }

    fn use_program(&self, program: Option<glow::Program>) {
        unsafe { self.gl.use_program(program) };
    }

    fn set_uniform(&self, program: glow::Program, name: &str, value: UniformValue) {
        unsafe {
            let Some(location) = self.gl.get_uniform_location(program, name) else {
                return;
            };
            let location = Some(&location);
            match value {
                UniformValue::Int(v) => self.gl.uniform_1_i32(location, v),
                UniformValue::Float(v) => self.gl.uniform_1_f32(location, v),
                UniformValue::Double(v) => self.gl.uniform_1_f64(location, v),
                UniformValue::Vec2([x, y]) => self.gl.uniform_2_f32(location, x, y),
                UniformValue::DVec2([x, y]) => self.gl.uniform_2_f64(location, x, y),
                UniformValue::IVec2([x, y]) => self.gl.uniform_2_i32(location, x, y),
                UniformValue::Vec4([x, y, z, w]) => self.gl.uniform_4_f32(location, x, y, z, w),
            }
        }
    }

    fn create_quad_buffers(&self) -> Result<(glow::Buffer, glow::Buffer)> {
        let vertex_bytes: Vec<u8> = QUAD_VERTICES.iter().flat_map(|v| v.to_ne_bytes()).collect();
        let index_bytes: Vec<u8> = QUAD_INDICES.iter().flat_map(|i| i.to_ne_bytes()).collect();
        unsafe {
            let vertices = self
                .gl
                .create_buffer()
                .map_err(RenderError::ResourceAllocation)?;
            let indices = match self.gl.create_buffer() {
                Ok(buffer) => buffer,
                Err(e) => {
                    self.gl.delete_buffer(vertices);
                    return Err(RenderError::ResourceAllocation(e));
                }
            };
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(vertices));
            self.gl
                .buffer_data_u8_slice(glow::ARRAY_BUFFER, &vertex_bytes, glow::STATIC_DRAW);
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
            // Element buffer binding is VAO state; upload through ARRAY_BUFFER.
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(indices));
            self.gl
                .buffer_data_u8_slice(glow::ARRAY_BUFFER, &index_bytes, glow::STATIC_DRAW);
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
            Ok((vertices, indices))
        }
    }

    fn delete_buffer(&self, buffer: glow::Buffer) {
        unsafe { self.gl.delete_buffer(buffer) };
    }

    fn create_vertex_array(
        &self,
        vertices: glow::Buffer,
        indices: glow::Buffer,
    ) -> Result<glow::VertexArray> {
        unsafe {
            let vao = self
                .gl
                .create_vertex_array()
                .map_err(RenderError::ResourceAllocation)?;
            self.gl.bind_vertex_array(Some(vao));
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(vertices));
            self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(indices));
            self.gl.enable_vertex_attrib_array(0);
            self.gl
                .vertex_attrib_pointer_f32(0, 2, glow::FLOAT, false, 2 * 4, 0);
            self.gl.bind_vertex_array(None);
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
            Ok(vao)
        }
    }

    fn delete_vertex_array(&self, vao: glow::VertexArray) {
        unsafe { self.gl.delete_vertex_array(vao) };
    }

    fn draw_quad(&self, vao: glow::VertexArray) {
        unsafe {
            self.gl.bind_vertex_array(Some(vao));
            self.gl.draw_elements(
                glow::TRIANGLES,
                QUAD_INDICES.len() as i32,
                glow::UNSIGNED_INT,
                0,
            );
            self.gl.bind_vertex_array(None);
        }
    }

    fn max_texture_size(&self) -> u32 {
        let max = unsafe { self.gl.get_parameter_i32(glow::MAX_TEXTURE_SIZE) };
        u32::try_from(max).unwrap_or(0)
    }

    fn create_texture(&self, size: u32) -> Result<glow::Texture> {
        let levels = (u32::BITS - size.max(1).leading_zeros()) as i32;
        unsafe {
            let texture = self
                .gl
                .create_texture()
                .map_err(RenderError::ResourceAllocation)?;
            self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            self.gl.tex_storage_2d(
                glow::TEXTURE_2D,
                levels,
                glow::RGBA8,
                gl_size(size),
                gl_size(size),
            );
            let error = self.gl.get_error();
            if error != glow::NO_ERROR {
                self.gl.bind_texture(glow::TEXTURE_2D, None);
                self.gl.delete_texture(texture);
                return Err(RenderError::ResourceAllocation(format!(
                    "texture storage {size}x{size} failed with GL error 0x{error:04X}"
                )));
            }
            self.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                glow::LINEAR_MIPMAP_LINEAR as i32,
            );
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            self.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                glow::CLAMP_TO_EDGE as i32,
            );
            self.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                glow::CLAMP_TO_EDGE as i32,
            );
            self.gl.bind_texture(glow::TEXTURE_2D, None);
            Ok(texture)
        }
    }

    fn delete_texture(&self, texture: glow::Texture) {
        unsafe { self.gl.delete_texture(texture) };
    }

    fn bind_texture(&self, unit: u32, texture: Option<glow::Texture>) {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl.bind_texture(glow::TEXTURE_2D, texture);
        }
    }

    fn generate_mipmaps(&self, texture: glow::Texture) {
        unsafe {
            self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            self.gl.generate_mipmap(glow::TEXTURE_2D);
            self.gl.bind_texture(glow::TEXTURE_2D, None);
        }
    }

    fn read_texture_rgba(&self, texture: glow::Texture, size: u32) -> Result<Vec<u8>> {
        let len = size as usize * size as usize * 4;
        let mut pixels = vec![0u8; len];
        unsafe {
            self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            self.gl.pixel_store_i32(glow::PACK_ALIGNMENT, 1);
            self.gl.get_tex_image(
                glow::TEXTURE_2D,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelPackData::Slice(Some(pixels.as_mut_slice())),
            );
            self.gl.bind_texture(glow::TEXTURE_2D, None);
            let error = self.gl.get_error();
            if error != glow::NO_ERROR {
                return Err(RenderError::Export(format!(
                    "texture read-back failed with GL error 0x{error:04X}"
                )));
            }
        }
        Ok(pixels)
    }

    fn create_framebuffer(&self, texture: glow::Texture) -> Result<glow::Framebuffer> {
        unsafe {
            let framebuffer = self
                .gl
                .create_framebuffer()
                .map_err(RenderError::ResourceAllocation)?;
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            self.gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(texture),
                0,
            );
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            Ok(framebuffer)
        }
    }

    fn framebuffer_status(&self, framebuffer: glow::Framebuffer) -> FramebufferStatus {
        unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            let status = self.gl.check_framebuffer_status(glow::FRAMEBUFFER);
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            if status == glow::FRAMEBUFFER_COMPLETE {
                FramebufferStatus::Complete
            } else {
                FramebufferStatus::Incomplete(status)
            }
        }
    }

    fn bind_framebuffer(&self, framebuffer: Option<glow::Framebuffer>) {
        unsafe { self.gl.bind_framebuffer(glow::FRAMEBUFFER, framebuffer) };
    }

    fn delete_framebuffer(&self, framebuffer: glow::Framebuffer) {
        unsafe { self.gl.delete_framebuffer(framebuffer) };
    }

    fn set_viewport(&self, rect: Rect) {
        unsafe {
            self.gl.viewport(
                gl_size(rect.x),
                gl_size(rect.y),
                gl_size(rect.width),
                gl_size(rect.height),
            );
        }
    }

    fn set_scissor(&self, rect: Option<Rect>) {
        unsafe {
            match rect {
                Some(rect) => {
                    self.gl.enable(glow::SCISSOR_TEST);
                    self.gl.scissor(
                        gl_size(rect.x),
                        gl_size(rect.y),
                        gl_size(rect.width),
                        gl_size(rect.height),
                    );
                }
                None => self.gl.disable(glow::SCISSOR_TEST),
            }
        }
    }

    fn clear(&self, [r, g, b, a]: [f32; 4]) {
        unsafe {
            self.gl.clear_color(r, g, b, a);
            self.gl.clear(glow::COLOR_BUFFER_BIT);
        }
    }

    fn flush(&self) {
        unsafe { self.gl.flush() };
    }

    fn create_fence(&self) -> Result<GlFence> {
        unsafe {
            self.gl
                .fence_sync(glow::SYNC_GPU_COMMANDS_COMPLETE, 0)
                .map(GlFence)
                .map_err(RenderError::ResourceAllocation)
        }
    }

    fn client_wait(&self, fence: &GlFence, timeout: Duration) -> FenceStatus {
        let nanos = timeout.as_nanos().min(MAX_WAIT_NANOS) as i32;
        let status =
            unsafe { self.gl.client_wait_sync(fence.0, glow::SYNC_FLUSH_COMMANDS_BIT, nanos) };
        match status {
            glow::ALREADY_SIGNALED | glow::CONDITION_SATISFIED => FenceStatus::Signaled,
            glow::TIMEOUT_EXPIRED => FenceStatus::TimedOut,
            other => {
                warn!("glClientWaitSync returned 0x{other:04X}");
                FenceStatus::Failed
            }
        }
    }

    fn delete_fence(&self, fence: GlFence) {
        unsafe { self.gl.delete_sync(fence.0) };
    }
}

// ---------------------------------------------------------------------------
// Worker context
// ---------------------------------------------------------------------------

enum Slot {
    Idle(NotCurrentContext),
    Current(PossiblyCurrentContext),
    Lost,
}

/// A context created in the main context's share group, made current
/// without a surface on the pre-render thread.
pub struct WorkerContext {
    slot: Slot,
}

// SAFETY: the context only moves between threads in the `Idle` state;
// `release` always returns it there before the worker hands it back.
unsafe impl Send for WorkerContext {}

impl WorkerContext {
    pub fn new(context: NotCurrentContext) -> Self {
        Self {
            slot: Slot::Idle(context),
        }
    }
}

impl SharedContext for WorkerContext {
    type Gpu = GlowGpu;

    fn make_current(&mut self) -> Result<GlowGpu> {
        let context = match std::mem::replace(&mut self.slot, Slot::Lost) {
            Slot::Idle(context) => context,
            Slot::Current(current) => {
                self.slot = Slot::Current(current);
                return Err(RenderError::ContextActivation(
                    "worker context is already current".into(),
                ));
            }
            Slot::Lost => {
                return Err(RenderError::ContextActivation(
                    "worker context was lost".into(),
                ))
            }
        };

        let display = context.display();
        let current = context
            .make_current_surfaceless()
            .map_err(|e| RenderError::ContextActivation(e.to_string()))?;
        let gl = unsafe { glow::Context::from_loader_function_cstr(|s| display.get_proc_address(s)) };
        self.slot = Slot::Current(current);
        debug!("Worker context current");
        Ok(GlowGpu::new(Arc::new(gl)))
    }

    fn release(&mut self) {
        self.slot = match std::mem::replace(&mut self.slot, Slot::Lost) {
            Slot::Current(current) => match current.make_not_current() {
                Ok(context) => Slot::Idle(context),
                Err(e) => {
                    warn!("Failed to release worker context: {e}");
                    Slot::Lost
                }
            },
            other => other,
        };
    }
}
