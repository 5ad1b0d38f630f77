//! A bookkeeping-only [`Gpu`] that draws nothing.
//!
//! Every handle it returns is tracked in a shared table so tests can count
//! live objects, inspect bound uniforms and check the order in which
//! draws, fences and mipmap generation happened across both contexts.
//! Failure modes (shader errors, incomplete framebuffers, slow fences) are
//! injected through [`HeadlessConfig`].
//!
//! Framebuffers and vertex arrays are container objects and belong to the
//! context that created them. Deleting one from the other context leaves
//! it alive and is counted in [`ResourceStats::foreign_deletes`].

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use mesmer_core::uniforms::U_TILE;
use mesmer_core::UniformValue;

use crate::error::RenderError;
use crate::gpu::{FenceStatus, FramebufferStatus, Gpu, Rect, SharedContext};
use crate::Result;

/// GL_FRAMEBUFFER_INCOMPLETE_ATTACHMENT, reported for injected failures.
const INCOMPLETE_ATTACHMENT: u32 = 0x8CD6;

/// Failure injection and limits.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    pub max_texture_size: u32,
    /// Program creation fails when the fragment source contains this text.
    pub fail_fragment_containing: Option<String>,
    /// Every framebuffer reports itself incomplete.
    pub incomplete_framebuffer: bool,
    /// How many waits on a fresh fence time out before it signals.
    pub fence_timeouts: u32,
    /// Sleep inside [`SharedContext::release`], between the last fence and
    /// the worker's completion flag.
    pub release_delay: Duration,
    pub fail_activation: bool,
    /// Panic inside [`SharedContext::make_current`], as a crashing driver would.
    pub panic_on_activation: bool,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            max_texture_size: 16384,
            fail_fragment_containing: None,
            incomplete_framebuffer: false,
            fence_timeouts: 0,
            release_delay: Duration::ZERO,
            fail_activation: false,
            panic_on_activation: false,
        }
    }
}

/// Which context issued a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextRole {
    Main,
    Worker,
}

/// Recorded side effects, in global order.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuEvent {
    Draw {
        role: ContextRole,
        program: Option<u64>,
        /// Bound framebuffer, `None` for the window.
        target: Option<u64>,
        scissor: Option<Rect>,
        tile: Option<[i32; 2]>,
    },
    FenceCreated(u64),
    FenceSignaled(u64),
    FenceDeleted(u64),
    MipmapsGenerated(u64),
    ContextReleased,
    /// A container object was deleted from a context that does not own it.
    ForeignDelete { role: ContextRole, object: u64 },
}

/// Live object counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceStats {
    pub programs: usize,
    pub main_programs: usize,
    pub peak_main_programs: usize,
    pub buffers: usize,
    pub vertex_arrays: usize,
    pub textures: usize,
    pub framebuffers: usize,
    pub fences: usize,
    pub foreign_deletes: usize,
}

#[derive(Debug, Default)]
struct RoleState {
    program: Option<u64>,
    scissor: Option<Rect>,
    framebuffer: Option<u64>,
}

#[derive(Debug, Default)]
struct State {
    config: HeadlessConfig,
    next_id: u64,
    programs: HashMap<u64, ContextRole>,
    uniforms: HashMap<u64, HashMap<String, UniformValue>>,
    buffers: HashSet<u64>,
    vertex_arrays: HashMap<u64, ContextRole>,
    textures: HashMap<u64, u32>,
    framebuffers: HashMap<u64, ContextRole>,
    fences: HashMap<u64, u32>,
    roles: HashMap<ContextRole, RoleState>,
    peak_main_programs: usize,
    foreign_deletes: usize,
    events: Vec<GpuEvent>,
}

impl State {
    fn alloc(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn role(&mut self, role: ContextRole) -> &mut RoleState {
        self.roles.entry(role).or_default()
    }

    /// Remove a per-context object unless another context owns it.
    /// Returns `false` for a foreign delete.
    fn delete_owned(table: &mut HashMap<u64, ContextRole>, id: u64, role: ContextRole) -> bool {
        if table.get(&id).is_some_and(|&owner| owner != role) {
            return false;
        }
        table.remove(&id);
        true
    }

    fn foreign_delete(&mut self, role: ContextRole, object: u64) {
        self.foreign_deletes += 1;
        self.events.push(GpuEvent::ForeignDelete { role, object });
    }

    fn main_programs(&self) -> usize {
        self.programs
            .values()
            .filter(|&&r| r == ContextRole::Main)
            .count()
    }
}

type Shared = Arc<Mutex<State>>;

fn lock(shared: &Shared) -> MutexGuard<'_, State> {
    // A panicking test thread must not hide the bookkeeping from the others.
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

/// Opaque handle for every object type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub u64);

/// Fence handle. Deliberately not `Copy`, like a real sync object.
#[derive(Debug, PartialEq, Eq)]
pub struct HeadlessFence(pub u64);

/// See the module documentation.
#[derive(Debug, Clone)]
pub struct HeadlessGpu {
    shared: Shared,
    role: ContextRole,
}

impl HeadlessGpu {
    pub fn new(config: HeadlessConfig) -> Self {
        let state = State {
            config,
            ..State::default()
        };
        Self {
            shared: Arc::new(Mutex::new(state)),
            role: ContextRole::Main,
        }
    }

    /// A worker context sharing this GPU's object table.
    pub fn shared_context(&self) -> HeadlessContext {
        HeadlessContext {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn role(&self) -> ContextRole {
        self.role
    }

    pub fn stats(&self) -> ResourceStats {
        let state = lock(&self.shared);
        ResourceStats {
            programs: state.programs.len(),
            main_programs: state.main_programs(),
            peak_main_programs: state.peak_main_programs,
            buffers: state.buffers.len(),
            vertex_arrays: state.vertex_arrays.len(),
            textures: state.textures.len(),
            framebuffers: state.framebuffers.len(),
            fences: state.fences.len(),
            foreign_deletes: state.foreign_deletes,
        }
    }

    pub fn events(&self) -> Vec<GpuEvent> {
        lock(&self.shared).events.clone()
    }

    pub fn clear_events(&self) {
        lock(&self.shared).events.clear();
    }

    /// Last value assigned to `name` on the program currently in use on
    /// the main context.
    pub fn bound_uniform(&self, name: &str) -> Option<UniformValue> {
        let mut state = lock(&self.shared);
        let program = state.role(ContextRole::Main).program?;
        state.uniforms.get(&program)?.get(name).copied()
    }

    /// Dimensions of a live texture.
    pub fn texture_size(&self, texture: Handle) -> Option<u32> {
        lock(&self.shared).textures.get(&texture.0).copied()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.shared)
    }
}

impl Gpu for HeadlessGpu {
    type Program = Handle;
    type Buffer = Handle;
    type VertexArray = Handle;
    type Texture = Handle;
    type Framebuffer = Handle;
    type Fence = HeadlessFence;

    fn create_program(&self, _vertex_src: &str, fragment_src: &str) -> Result<Handle> {
        let mut state = self.state();
        if let Some(marker) = &state.config.fail_fragment_containing {
            if fragment_src.contains(marker.as_str()) {
                return Err(RenderError::ShaderCompile {
                    stage: "fragment",
                    log: format!("injected failure on `{marker}`"),
                });
            }
        }
        let id = state.alloc();
        state.programs.insert(id, self.role);
        state.uniforms.insert(id, HashMap::new());
        let live = state.main_programs();
        state.peak_main_programs = state.peak_main_programs.max(live);
        Ok(Handle(id))
    }

    fn delete_program(&self, program: Handle) {
        let mut state = self.state();
        state.programs.remove(&program.0);
        state.uniforms.remove(&program.0);
        let role = state.role(self.role);
        if role.program == Some(program.0) {
            role.program = None;
        }
    }

    fn use_program(&self, program: Option<Handle>) {
        self.state().role(self.role).program = program.map(|p| p.0);
    }

    fn set_uniform(&self, program: Handle, name: &str, value: UniformValue) {
        if let Some(table) = self.state().uniforms.get_mut(&program.0) {
            table.insert(name.to_string(), value);
        }
    }

    fn create_quad_buffers(&self) -> Result<(Handle, Handle)> {
        let mut state = self.state();
        let vertices = state.alloc();
        let indices = state.alloc();
        state.buffers.insert(vertices);
        state.buffers.insert(indices);
        Ok((Handle(vertices), Handle(indices)))
    }

    fn delete_buffer(&self, buffer: Handle) {
        self.state().buffers.remove(&buffer.0);
    }

    fn create_vertex_array(&self, vertices: Handle, indices: Handle) -> Result<Handle> {
        let mut state = self.state();
        if !state.buffers.contains(&vertices.0) || !state.buffers.contains(&indices.0) {
            return Err(RenderError::ResourceAllocation(
                "vertex array over deleted buffers".into(),
            ));
        }
        let id = state.alloc();
        state.vertex_arrays.insert(id, self.role);
        Ok(Handle(id))
    }

    fn delete_vertex_array(&self, vao: Handle) {
        let mut state = self.state();
        if !State::delete_owned(&mut state.vertex_arrays, vao.0, self.role) {
            state.foreign_delete(self.role, vao.0);
        }
    }

    fn draw_quad(&self, _vao: Handle) {
        let mut state = self.state();
        let role = self.role;
        let (program, target, scissor) = {
            let r = state.role(role);
            (r.program, r.framebuffer, r.scissor)
        };
        let tile = program
            .and_then(|p| state.uniforms.get(&p))
            .and_then(|u| u.get(U_TILE))
            .and_then(|v| match v {
                UniformValue::IVec2(t) => Some(*t),
                _ => None,
            });
        state.events.push(GpuEvent::Draw {
            role,
            program,
            target,
            scissor,
            tile,
        });
    }

    fn max_texture_size(&self) -> u32 {
        self.state().config.max_texture_size
    }

    fn create_texture(&self, size: u32) -> Result<Handle> {
        let mut state = self.state();
        if size == 0 || size > state.config.max_texture_size {
            return Err(RenderError::ResourceAllocation(format!(
                "{size}×{size} texture"
            )));
        }
        let id = state.alloc();
        state.textures.insert(id, size);
        Ok(Handle(id))
    }

    fn delete_texture(&self, texture: Handle) {
        self.state().textures.remove(&texture.0);
    }

    fn bind_texture(&self, _unit: u32, _texture: Option<Handle>) {}

    fn generate_mipmaps(&self, texture: Handle) {
        self.state()
            .events
            .push(GpuEvent::MipmapsGenerated(texture.0));
    }

    fn read_texture_rgba(&self, texture: Handle, size: u32) -> Result<Vec<u8>> {
        let state = self.state();
        if !state.textures.contains_key(&texture.0) {
            return Err(RenderError::Export("texture no longer exists".into()));
        }
        // Row index in the red channel so orientation can be checked.
        let mut pixels = Vec::with_capacity(size as usize * size as usize * 4);
        for row in 0..size {
            for _ in 0..size {
                pixels.extend_from_slice(&[(row % 256) as u8, 0, 0, 255]);
            }
        }
        Ok(pixels)
    }

    fn create_framebuffer(&self, texture: Handle) -> Result<Handle> {
        let mut state = self.state();
        if !state.textures.contains_key(&texture.0) {
            return Err(RenderError::ResourceAllocation(
                "framebuffer over a deleted texture".into(),
            ));
        }
        let id = state.alloc();
        state.framebuffers.insert(id, self.role);
        Ok(Handle(id))
    }

    fn framebuffer_status(&self, framebuffer: Handle) -> FramebufferStatus {
        let state = self.state();
        if state.config.incomplete_framebuffer || !state.framebuffers.contains_key(&framebuffer.0)
        {
            FramebufferStatus::Incomplete(INCOMPLETE_ATTACHMENT)
        } else {
            FramebufferStatus::Complete
        }
    }

    fn bind_framebuffer(&self, framebuffer: Option<Handle>) {
        self.state().role(self.role).framebuffer = framebuffer.map(|f| f.0);
    }

    fn delete_framebuffer(&self, framebuffer: Handle) {
        let mut state = self.state();
        if !State::delete_owned(&mut state.framebuffers, framebuffer.0, self.role) {
            state.foreign_delete(self.role, framebuffer.0);
        }
    }

    fn set_viewport(&self, _rect: Rect) {}

    fn set_scissor(&self, rect: Option<Rect>) {
        self.state().role(self.role).scissor = rect;
    }

    fn clear(&self, _rgba: [f32; 4]) {}

    fn flush(&self) {}

    fn create_fence(&self) -> Result<HeadlessFence> {
        let mut state = self.state();
        let id = state.alloc();
        let timeouts = state.config.fence_timeouts;
        state.fences.insert(id, timeouts);
        state.events.push(GpuEvent::FenceCreated(id));
        Ok(HeadlessFence(id))
    }

    fn client_wait(&self, fence: &HeadlessFence, _timeout: Duration) -> FenceStatus {
        let mut state = self.state();
        let Some(remaining) = state.fences.get_mut(&fence.0) else {
            return FenceStatus::Failed;
        };
        if *remaining > 0 {
            *remaining -= 1;
            return FenceStatus::TimedOut;
        }
        state.events.push(GpuEvent::FenceSignaled(fence.0));
        FenceStatus::Signaled
    }

    fn delete_fence(&self, fence: HeadlessFence) {
        let mut state = self.state();
        state.fences.remove(&fence.0);
        state.events.push(GpuEvent::FenceDeleted(fence.0));
    }
}

/// Worker-side counterpart of [`HeadlessGpu`].
#[derive(Debug)]
pub struct HeadlessContext {
    shared: Shared,
}

impl SharedContext for HeadlessContext {
    type Gpu = HeadlessGpu;

    fn make_current(&mut self) -> Result<HeadlessGpu> {
        let panic_now = lock(&self.shared).config.panic_on_activation;
        if panic_now {
            panic!("injected worker panic");
        }
        if lock(&self.shared).config.fail_activation {
            return Err(RenderError::ContextActivation(
                "injected activation failure".into(),
            ));
        }
        Ok(HeadlessGpu {
            shared: Arc::clone(&self.shared),
            role: ContextRole::Worker,
        })
    }

    fn release(&mut self) {
        let delay = {
            let mut state = lock(&self.shared);
            *state.role(ContextRole::Worker) = RoleState::default();
            state.config.release_delay
        };
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        lock(&self.shared).events.push(GpuEvent::ContextReleased);
    }
}
