//! Tiled offscreen rendering on a second, shared GPU context.
//!
//! The worker thread owns the shared context for the duration of one job.
//! It draws the target tile by tile, waiting on a fence after each tile so
//! no single submission runs long enough to trip a driver watchdog, then
//! inserts a final fence and hands everything back through a channel. The
//! main thread only touches the result after it has observed the
//! completion flag *and* the final fence has signaled on its own context.
//!
//! Cancellation is cooperative only at job granularity: a running job is
//! always finished and its texture discarded.

use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use mesmer_core::uniforms::{bind_prerender, U_TILE};
use mesmer_core::{FractalKind, PreRenderInputs, UniformValue};
use tracing::{debug, error, info, warn};

use crate::error::RenderError;
use crate::fence::{await_fence, poll_fence, FENCE_WAIT_SLICE};
use crate::gpu::{FenceStatus, FramebufferStatus, Gpu, Rect, SharedContext};
use crate::quad::QuadBuffers;
use crate::shader::{ShaderProgram, ShaderSource};
use crate::tile::{build_tile_grid, Tile};
use crate::Result;

/// Pause between tiles so the compositor gets GPU time.
pub const TILE_PAUSE: Duration = Duration::from_millis(1);

/// Default square pre-render target edge.
pub const DEFAULT_RESOLUTION: u32 = 4096;

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Counters shared between the worker and the UI.
///
/// `submitted` is the completion flag: it is stored with `Release` after
/// the worker's report is queued and after its last GPU command has been
/// flushed, and read with `Acquire` before the report is touched.
#[derive(Debug, Default)]
pub struct PreRenderProgress {
    tiles_done: AtomicUsize,
    tiles_total: AtomicUsize,
    submitted: AtomicBool,
}

impl PreRenderProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&self, total: usize) {
        self.tiles_total.store(total, Ordering::Relaxed);
        self.tiles_done.store(0, Ordering::Relaxed);
        self.submitted.store(false, Ordering::Release);
    }

    fn inc(&self) {
        self.tiles_done.fetch_add(1, Ordering::Relaxed);
    }

    fn mark_submitted(&self) {
        self.submitted.store(true, Ordering::Release);
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted.load(Ordering::Acquire)
    }

    /// `(done, total)` tiles.
    pub fn tiles(&self) -> (usize, usize) {
        (
            self.tiles_done.load(Ordering::Relaxed),
            self.tiles_total.load(Ordering::Relaxed),
        )
    }

    /// Completed fraction in `[0, 1]`; zero before the tile count is known.
    pub fn fraction(&self) -> f32 {
        match self.tiles() {
            (_, 0) => 0.0,
            (done, total) => (done as f32 / total as f32).min(1.0),
        }
    }
}

// ---------------------------------------------------------------------------
// Job and results
// ---------------------------------------------------------------------------

/// Everything the worker needs. Built on the main thread.
pub struct PreRenderJob<G: Gpu> {
    pub inputs: PreRenderInputs,
    pub vertex: ShaderSource,
    /// Fractal fragment source compiled with the pre-render define.
    pub fragment: ShaderSource,
    pub quad: QuadBuffers<G>,
}

/// Lifecycle of the current job as seen from the main thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    /// The worker is drawing tiles.
    Submitting,
    /// Submission finished; waiting on the final fence.
    AwaitingFence,
    /// The texture is complete and can be taken.
    Ready,
}

/// Outcome of [`PreRenderer::poll`].
#[derive(Debug)]
pub enum PreRenderPoll {
    Idle,
    Pending,
    Ready,
    Failed(RenderError),
}

struct WorkerOutput<G: Gpu> {
    texture: G::Texture,
    fence: G::Fence,
    /// Inputs with the resolution actually rendered.
    inputs: PreRenderInputs,
    tiles: usize,
}

struct WorkerReport<C: SharedContext> {
    context: C,
    outcome: Result<WorkerOutput<C::Gpu>>,
}

/// A finished pre-render target. The texture is freed on drop.
pub struct BakedTexture<G: Gpu> {
    gpu: Rc<G>,
    texture: G::Texture,
    resolution: u32,
    inputs: PreRenderInputs,
}

impl<G: Gpu> BakedTexture<G> {
    pub fn texture(&self) -> G::Texture {
        self.texture
    }

    /// Edge length actually rendered, after clamping.
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn inputs(&self) -> &PreRenderInputs {
        &self.inputs
    }

    /// Level-0 pixels as RGBA8, bottom row first.
    pub fn read_pixels(&self) -> Result<Vec<u8>> {
        self.gpu.read_texture_rgba(self.texture, self.resolution)
    }
}

impl<G: Gpu> Drop for BakedTexture<G> {
    fn drop(&mut self) {
        self.gpu.delete_texture(self.texture);
        debug!(resolution = self.resolution, "Pre-rendered texture released");
    }
}

/// Largest power of two that is `<= requested` and `<= max`.
pub fn clamp_resolution(requested: u32, max: u32) -> Result<u32> {
    let limit = requested.min(max);
    if limit == 0 {
        return Err(RenderError::InvalidResolution(requested));
    }
    let pow2 = 1u32 << (31 - limit.leading_zeros());
    if pow2 != requested {
        info!(requested, max, used = pow2, "Pre-render resolution adjusted");
    }
    Ok(pow2)
}

// ---------------------------------------------------------------------------
// Worker side
// ---------------------------------------------------------------------------

fn run_worker<C: SharedContext>(
    mut context: C,
    job: PreRenderJob<C::Gpu>,
    progress: Arc<PreRenderProgress>,
    reports: Sender<WorkerReport<C>>,
) {
    let start = Instant::now();
    let kind = job.inputs.kind;
    let outcome = if kind == FractalKind::None {
        error!("Pre-render requested without a fractal kind");
        Err(RenderError::InvalidFractalKind)
    } else {
        match context.make_current() {
            Ok(gpu) => {
                let gpu = Rc::new(gpu);
                let outcome = bake(&gpu, &job, &progress);
                drop(gpu);
                context.release();
                outcome
            }
            Err(e) => Err(e),
        }
    };

    match &outcome {
        Ok(out) => info!(
            %kind,
            resolution = out.inputs.resolution,
            tiles = out.tiles,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Pre-render submitted"
        ),
        Err(e) => error!(%kind, "Pre-render aborted: {e}"),
    }

    // The report is queued before the flag flips; the main thread reads
    // the channel only after it observes the flag.
    if reports.send(WorkerReport { context, outcome }).is_err() {
        warn!("Pre-render finished after its owner went away");
    }
    progress.mark_submitted();
}

fn bake<G: Gpu>(
    gpu: &Rc<G>,
    job: &PreRenderJob<G>,
    progress: &PreRenderProgress,
) -> Result<WorkerOutput<G>> {
    let resolution = clamp_resolution(job.inputs.resolution, gpu.max_texture_size())?;
    let tiles = build_tile_grid(resolution, job.inputs.tile_size)?;
    let inputs = PreRenderInputs {
        resolution,
        ..job.inputs
    };
    let uniforms = bind_prerender(&inputs)?;
    progress.reset(tiles.len());

    let program = ShaderProgram::new(gpu, &job.vertex, &job.fragment)?;

    let texture = gpu.create_texture(resolution)?;
    let framebuffer = match gpu.create_framebuffer(texture) {
        Ok(fb) => fb,
        Err(e) => {
            gpu.delete_texture(texture);
            return Err(e);
        }
    };
    let free_target = || {
        gpu.bind_framebuffer(None);
        gpu.delete_framebuffer(framebuffer);
        gpu.delete_texture(texture);
    };

    if let FramebufferStatus::Incomplete(status) = gpu.framebuffer_status(framebuffer) {
        error!("Pre-render framebuffer incomplete (status 0x{status:04x})");
        free_target();
        return Err(RenderError::FramebufferIncomplete(status));
    }

    let vao = match gpu.create_vertex_array(job.quad.vertices, job.quad.indices) {
        Ok(vao) => vao,
        Err(e) => {
            free_target();
            return Err(e);
        }
    };

    gpu.bind_framebuffer(Some(framebuffer));
    program.apply(&uniforms);
    let drawn = draw_tiles(gpu.as_ref(), &program, vao, &tiles, progress);
    gpu.set_scissor(None);
    gpu.set_viewport(Rect::full(resolution, resolution));

    let fence = drawn.and_then(|()| {
        let fence = gpu.create_fence()?;
        gpu.flush();
        Ok(fence)
    });
    gpu.delete_vertex_array(vao);
    drop(program);

    match fence {
        Ok(fence) => {
            // Framebuffers are not shared; only the texture crosses over.
            gpu.bind_framebuffer(None);
            gpu.delete_framebuffer(framebuffer);
            Ok(WorkerOutput {
                texture,
                fence,
                inputs,
                tiles: tiles.len(),
            })
        }
        Err(e) => {
            free_target();
            Err(e)
        }
    }
}

fn draw_tiles<G: Gpu>(
    gpu: &G,
    program: &ShaderProgram<G>,
    vao: G::VertexArray,
    tiles: &[Tile],
    progress: &PreRenderProgress,
) -> Result<()> {
    for tile in tiles {
        let rect = tile.rect();
        gpu.set_viewport(rect);
        gpu.set_scissor(Some(rect));
        program.set(
            U_TILE,
            UniformValue::IVec2([tile.col as i32, tile.row as i32]),
        );
        gpu.draw_quad(vao);
        gpu.flush();

        let fence = gpu.create_fence()?;
        let waited = await_fence(gpu, &fence, FENCE_WAIT_SLICE);
        gpu.delete_fence(fence);
        waited?;

        progress.inc();
        thread::sleep(TILE_PAUSE);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Main-thread side
// ---------------------------------------------------------------------------

/// Owns the shared context and at most one pre-render job.
///
/// The context travels with the worker and comes back in its report. A
/// worker that panics takes the context with it, so pre-rendering stays
/// unavailable for the rest of the session.
pub struct PreRenderer<C: SharedContext> {
    gpu: Rc<C::Gpu>,
    context: Option<C>,
    worker: Option<JoinHandle<()>>,
    reports: Option<Receiver<WorkerReport<C>>>,
    progress: Arc<PreRenderProgress>,
    state: JobState,
    pending: Option<WorkerOutput<C::Gpu>>,
    ready: Option<BakedTexture<C::Gpu>>,
    started: Option<Instant>,
}

impl<C: SharedContext> PreRenderer<C> {
    /// `context` is `None` when no shared context could be created; every
    /// job then fails with [`RenderError::WorkerContextUnavailable`].
    pub fn new(gpu: Rc<C::Gpu>, context: Option<C>) -> Self {
        Self {
            gpu,
            context,
            worker: None,
            reports: None,
            progress: Arc::new(PreRenderProgress::new()),
            state: JobState::Idle,
            pending: None,
            ready: None,
            started: None,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn progress(&self) -> &PreRenderProgress {
        &self.progress
    }

    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    /// Spawn a worker for `job`.
    ///
    /// Any finished but untaken result is discarded first. Fails with
    /// [`RenderError::WorkerBusy`] while another job is still running.
    pub fn start(&mut self, job: PreRenderJob<C::Gpu>) -> Result<()> {
        if matches!(self.state, JobState::Submitting | JobState::AwaitingFence) {
            return Err(RenderError::WorkerBusy);
        }
        self.cancel();
        if job.inputs.tile_size == 0 {
            return Err(RenderError::InvalidTileSize(0));
        }
        let context = self
            .context
            .take()
            .ok_or(RenderError::WorkerContextUnavailable)?;

        self.progress.reset(0);
        let (tx, rx) = mpsc::channel();
        let progress = Arc::clone(&self.progress);
        let inputs = job.inputs;
        let handle = thread::Builder::new()
            .name("prerender-worker".into())
            .spawn(move || run_worker(context, job, progress, tx))
            .map_err(|e| {
                error!("Failed to spawn pre-render worker: {e}");
                RenderError::WorkerSpawn(e)
            })?;

        info!(
            kind = %inputs.kind,
            resolution = inputs.resolution,
            tile_size = inputs.tile_size,
            "Pre-render started"
        );
        self.worker = Some(handle);
        self.reports = Some(rx);
        self.state = JobState::Submitting;
        self.started = Some(Instant::now());
        Ok(())
    }

    /// Advance the job without blocking. Call once per frame.
    pub fn poll(&mut self) -> PreRenderPoll {
        match self.state {
            JobState::Idle => PreRenderPoll::Idle,
            JobState::Ready => PreRenderPoll::Ready,
            JobState::Submitting => {
                let finished = self.worker.as_ref().is_some_and(|h| h.is_finished());
                if !self.progress.is_submitted() {
                    if finished {
                        // Exited without raising the flag: it panicked.
                        let e = match self.collect() {
                            Ok(output) => {
                                self.free_output(output);
                                RenderError::WorkerPanicked
                            }
                            Err(e) => e,
                        };
                        return self.fail(e);
                    }
                    return PreRenderPoll::Pending;
                }
                match self.collect() {
                    Ok(output) => {
                        self.pending = Some(output);
                        self.state = JobState::AwaitingFence;
                        self.poll_fence()
                    }
                    Err(e) => self.fail(e),
                }
            }
            JobState::AwaitingFence => self.poll_fence(),
        }
    }

    /// Take the finished texture, returning to [`JobState::Idle`].
    pub fn take_ready(&mut self) -> Option<BakedTexture<C::Gpu>> {
        if self.state != JobState::Ready {
            return None;
        }
        self.state = JobState::Idle;
        self.ready.take()
    }

    /// Stop tracking the current job and free its resources.
    ///
    /// A worker still drawing is joined first, so this blocks for the rest
    /// of that job's tiles.
    pub fn cancel(&mut self) {
        let previous = self.state;
        if self.worker.is_some() {
            if previous == JobState::Submitting {
                info!("Waiting for pre-render worker to finish before cancelling");
            }
            if let Ok(output) = self.collect() {
                self.free_output(output);
            }
        }
        if let Some(output) = self.pending.take() {
            self.free_output(output);
        }
        self.ready = None;
        self.started = None;
        self.state = JobState::Idle;
        if previous != JobState::Idle {
            debug!(?previous, "Pre-render cancelled");
        }
    }

    /// Join the worker and reclaim the context. Only called once the
    /// worker has finished or is about to.
    fn collect(&mut self) -> Result<WorkerOutput<C::Gpu>> {
        let joined = self.worker.take().map(JoinHandle::join);
        let report = self.reports.take().and_then(|rx| rx.try_recv().ok());
        if let Some(Err(_)) = joined {
            error!("Pre-render worker panicked");
        }
        match report {
            Some(report) => {
                self.context = Some(report.context);
                report.outcome
            }
            None => {
                error!("Shared context lost with the worker; pre-rendering disabled for this session");
                Err(RenderError::WorkerPanicked)
            }
        }
    }

    fn poll_fence(&mut self) -> PreRenderPoll {
        let Some(output) = self.pending.as_ref() else {
            self.state = JobState::Idle;
            return PreRenderPoll::Idle;
        };
        match poll_fence(self.gpu.as_ref(), &output.fence) {
            FenceStatus::TimedOut => PreRenderPoll::Pending,
            FenceStatus::Failed => {
                if let Some(output) = self.pending.take() {
                    self.free_output(output);
                }
                self.fail(RenderError::FenceFailed)
            }
            FenceStatus::Signaled => {
                let Some(output) = self.pending.take() else {
                    return PreRenderPoll::Pending;
                };
                self.gpu.generate_mipmaps(output.texture);
                self.gpu.delete_fence(output.fence);
                self.ready = Some(BakedTexture {
                    gpu: Rc::clone(&self.gpu),
                    texture: output.texture,
                    resolution: output.inputs.resolution,
                    inputs: output.inputs,
                });
                self.state = JobState::Ready;
                if let Some(started) = self.started.take() {
                    info!(
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Pre-render ready"
                    );
                }
                PreRenderPoll::Ready
            }
        }
    }

    fn free_output(&self, output: WorkerOutput<C::Gpu>) {
        self.gpu.delete_fence(output.fence);
        self.gpu.delete_texture(output.texture);
    }

    fn fail(&mut self, e: RenderError) -> PreRenderPoll {
        self.state = JobState::Idle;
        self.started = None;
        PreRenderPoll::Failed(e)
    }
}

impl<C: SharedContext> Drop for PreRenderer<C> {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_rounds_down_to_power_of_two() {
        assert_eq!(clamp_resolution(4096, 16384).unwrap(), 4096);
        assert_eq!(clamp_resolution(3000, 16384).unwrap(), 2048);
        assert_eq!(clamp_resolution(8192, 4096).unwrap(), 4096);
        assert_eq!(clamp_resolution(1, 1).unwrap(), 1);
    }

    #[test]
    fn zero_resolution_is_rejected() {
        assert!(matches!(
            clamp_resolution(0, 4096),
            Err(RenderError::InvalidResolution(0))
        ));
    }

    #[test]
    fn progress_fraction() {
        let p = PreRenderProgress::new();
        assert_eq!(p.fraction(), 0.0);
        p.reset(4);
        p.inc();
        assert_eq!(p.tiles(), (1, 4));
        assert_eq!(p.fraction(), 0.25);
        assert!(!p.is_submitted());
        p.mark_submitted();
        assert!(p.is_submitted());
    }
}
