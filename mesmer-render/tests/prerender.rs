use std::rc::Rc;
use std::thread;
use std::time::Duration;

use mesmer_core::{FractalKind, FractalParams, PaletteParams, PreRenderInputs};
use mesmer_render::headless::{ContextRole, GpuEvent, HeadlessConfig, HeadlessContext, HeadlessGpu};
use mesmer_render::{
    JobState, PreRenderJob, PreRenderPoll, PreRenderer, QuadMesh, Rect, RenderError, ShaderSource,
};

fn inputs(kind: FractalKind, resolution: u32, tile_size: u32) -> PreRenderInputs {
    PreRenderInputs {
        kind,
        center: (-0.75, 0.0),
        zoom: 1.0,
        params: FractalParams::DEFAULT,
        max_iterations: 200,
        palette: PaletteParams::CLASSIC,
        resolution,
        tile_size,
    }
}

fn job(quad: &QuadMesh<HeadlessGpu>, inputs: PreRenderInputs) -> PreRenderJob<HeadlessGpu> {
    PreRenderJob {
        inputs,
        vertex: ShaderSource::new("quad.vert", "#version 460 core\n"),
        fragment: ShaderSource::new("fractal.frag", "#version 460 core\n#define PRERENDER\n"),
        quad: quad.buffers(),
    }
}

fn setup(config: HeadlessConfig) -> (Rc<HeadlessGpu>, QuadMesh<HeadlessGpu>, PreRenderer<HeadlessContext>) {
    let gpu = Rc::new(HeadlessGpu::new(config));
    let quad = QuadMesh::new(&gpu).unwrap();
    let renderer = PreRenderer::new(Rc::clone(&gpu), Some(gpu.shared_context()));
    (gpu, quad, renderer)
}

fn wait(renderer: &mut PreRenderer<HeadlessContext>) -> PreRenderPoll {
    for _ in 0..5000 {
        match renderer.poll() {
            PreRenderPoll::Pending => thread::sleep(Duration::from_millis(1)),
            other => return other,
        }
    }
    panic!("pre-render did not finish");
}

fn worker_draws(events: &[GpuEvent]) -> Vec<(usize, Option<Rect>, Option<[i32; 2]>)> {
    events
        .iter()
        .enumerate()
        .filter_map(|(i, e)| match e {
            GpuEvent::Draw {
                role: ContextRole::Worker,
                scissor,
                tile,
                ..
            } => Some((i, *scissor, *tile)),
            _ => None,
        })
        .collect()
}

#[test]
fn tiles_are_drawn_row_major_with_one_fence_each() {
    let (gpu, quad, mut renderer) = setup(HeadlessConfig::default());
    renderer.start(job(&quad, inputs(FractalKind::Mandelbrot, 256, 64))).unwrap();
    assert!(matches!(wait(&mut renderer), PreRenderPoll::Ready));

    let events = gpu.events();
    let draws = worker_draws(&events);
    assert_eq!(draws.len(), 16, "(256/64)^2 tiles");
    assert!(events.iter().all(|e| match e {
        GpuEvent::Draw {
            role: ContextRole::Worker,
            target,
            ..
        } => target.is_some(),
        _ => true,
    }), "tiles go to the offscreen target");

    for (n, (_, scissor, tile)) in draws.iter().enumerate() {
        let (col, row) = ((n % 4) as u32, (n / 4) as u32);
        assert_eq!(*tile, Some([col as i32, row as i32]));
        assert_eq!(*scissor, Some(Rect::new(col * 64, row * 64, 64, 64)));
    }

    // The next tile is only issued after the previous tile's fence signaled.
    for pair in draws.windows(2) {
        let (this, next) = (pair[0].0, pair[1].0);
        let fence = events[this..next].iter().find_map(|e| match e {
            GpuEvent::FenceCreated(id) => Some(*id),
            _ => None,
        });
        let fence = fence.expect("every tile is fenced");
        assert!(events[this..next].contains(&GpuEvent::FenceSignaled(fence)));
    }

    assert_eq!(renderer.progress().tiles(), (16, 16));
    let baked = renderer.take_ready().expect("texture is ready");
    assert_eq!(baked.resolution(), 256);
    assert_eq!(renderer.state(), JobState::Idle);
    drop(baked);
    assert_eq!(gpu.stats().textures, 0);
}

#[test]
fn texture_is_untouched_until_flag_and_final_fence() {
    let (gpu, quad, mut renderer) = setup(HeadlessConfig {
        release_delay: Duration::from_millis(80),
        fence_timeouts: 3,
        ..HeadlessConfig::default()
    });
    renderer.start(job(&quad, inputs(FractalKind::Julia, 128, 64))).unwrap();

    // The worker is still inside its release delay.
    assert!(matches!(renderer.poll(), PreRenderPoll::Pending));
    assert_eq!(renderer.state(), JobState::Submitting);

    let mut pending_after_flag = 0;
    loop {
        match renderer.poll() {
            PreRenderPoll::Pending => {
                if renderer.state() == JobState::AwaitingFence {
                    pending_after_flag += 1;
                }
                thread::sleep(Duration::from_millis(1));
            }
            PreRenderPoll::Ready => break,
            other => panic!("unexpected poll result {other:?}"),
        }
    }
    assert!(pending_after_flag >= 1, "fence must gate readiness");

    let events = gpu.events();
    let position = |target: &GpuEvent| events.iter().position(|e| e == target);
    let final_fence = events
        .iter()
        .rev()
        .find_map(|e| match e {
            GpuEvent::FenceCreated(id) => Some(*id),
            _ => None,
        })
        .unwrap();
    let released = position(&GpuEvent::ContextReleased).unwrap();
    let signaled = position(&GpuEvent::FenceSignaled(final_fence)).unwrap();
    let mipmaps = events
        .iter()
        .position(|e| matches!(e, GpuEvent::MipmapsGenerated(_)))
        .unwrap();
    assert!(released < mipmaps);
    assert!(signaled < mipmaps);
    assert_eq!(gpu.stats().fences, 0);
}

#[test]
fn incomplete_framebuffer_frees_partial_resources() {
    let (gpu, quad, mut renderer) = setup(HeadlessConfig {
        incomplete_framebuffer: true,
        ..HeadlessConfig::default()
    });
    renderer.start(job(&quad, inputs(FractalKind::Mandelbrot, 256, 64))).unwrap();
    assert!(matches!(
        wait(&mut renderer),
        PreRenderPoll::Failed(RenderError::FramebufferIncomplete(_))
    ));

    let stats = gpu.stats();
    assert_eq!(stats.textures, 0);
    assert_eq!(stats.framebuffers, 0);
    assert_eq!(stats.fences, 0);
    assert_eq!(stats.programs, 0);
    assert_eq!(stats.vertex_arrays, 1, "only the main quad's vertex array");
    assert!(renderer.has_context(), "context comes back after a failure");
    assert_eq!(renderer.state(), JobState::Idle);
    drop(quad);
}

#[test]
fn idle_kind_aborts_before_allocating() {
    let (gpu, quad, mut renderer) = setup(HeadlessConfig::default());
    renderer.start(job(&quad, inputs(FractalKind::None, 256, 64))).unwrap();
    assert!(matches!(
        wait(&mut renderer),
        PreRenderPoll::Failed(RenderError::InvalidFractalKind)
    ));
    assert!(worker_draws(&gpu.events()).is_empty());
    assert_eq!(gpu.stats().textures, 0);
    assert_eq!(gpu.stats().programs, 0);
}

#[test]
fn resolution_is_clamped_to_driver_limit() {
    let (gpu, quad, mut renderer) = setup(HeadlessConfig {
        max_texture_size: 512,
        ..HeadlessConfig::default()
    });
    renderer.start(job(&quad, inputs(FractalKind::Tricorn, 4096, 256))).unwrap();
    assert!(matches!(wait(&mut renderer), PreRenderPoll::Ready));
    let baked = renderer.take_ready().unwrap();
    assert_eq!(baked.resolution(), 512);
    assert_eq!(baked.inputs().resolution, 512);
    assert_eq!(gpu.texture_size(baked.texture()), Some(512));
    assert_eq!(worker_draws(&gpu.events()).len(), 4);
}

#[test]
fn only_one_job_in_flight() {
    let (_gpu, quad, mut renderer) = setup(HeadlessConfig {
        release_delay: Duration::from_millis(50),
        ..HeadlessConfig::default()
    });
    renderer.start(job(&quad, inputs(FractalKind::Mandelbrot, 64, 64))).unwrap();
    assert!(matches!(
        renderer.start(job(&quad, inputs(FractalKind::Julia, 64, 64))),
        Err(RenderError::WorkerBusy)
    ));
    assert!(matches!(wait(&mut renderer), PreRenderPoll::Ready));
}

#[test]
fn cancel_joins_worker_and_frees_everything() {
    let (gpu, quad, mut renderer) = setup(HeadlessConfig {
        release_delay: Duration::from_millis(30),
        ..HeadlessConfig::default()
    });
    renderer.start(job(&quad, inputs(FractalKind::Phoenix, 256, 64))).unwrap();
    renderer.cancel();

    assert_eq!(renderer.state(), JobState::Idle);
    assert!(renderer.has_context());
    let stats = gpu.stats();
    assert_eq!((stats.textures, stats.framebuffers, stats.fences), (0, 0, 0));
    assert_eq!(stats.programs, 0);
    assert_eq!(stats.foreign_deletes, 0);

    // The reclaimed context can run the next job.
    renderer.start(job(&quad, inputs(FractalKind::Phoenix, 64, 64))).unwrap();
    assert!(matches!(wait(&mut renderer), PreRenderPoll::Ready));
}

#[test]
fn missing_context_is_reported() {
    let gpu = Rc::new(HeadlessGpu::new(HeadlessConfig::default()));
    let quad = QuadMesh::new(&gpu).unwrap();
    let mut renderer: PreRenderer<HeadlessContext> = PreRenderer::new(Rc::clone(&gpu), None);
    assert!(matches!(
        renderer.start(job(&quad, inputs(FractalKind::Mandelbrot, 64, 64))),
        Err(RenderError::WorkerContextUnavailable)
    ));
}

#[test]
fn activation_failure_returns_context() {
    let (_gpu, quad, mut renderer) = setup(HeadlessConfig {
        fail_activation: true,
        ..HeadlessConfig::default()
    });
    renderer.start(job(&quad, inputs(FractalKind::Spider, 64, 64))).unwrap();
    assert!(matches!(
        wait(&mut renderer),
        PreRenderPoll::Failed(RenderError::ContextActivation(_))
    ));
    assert!(renderer.has_context());
}

#[test]
fn worker_framebuffer_is_deleted_on_the_worker() {
    let (gpu, quad, mut renderer) = setup(HeadlessConfig::default());
    renderer.start(job(&quad, inputs(FractalKind::Julia, 256, 64))).unwrap();
    assert!(matches!(wait(&mut renderer), PreRenderPoll::Ready));

    // Only the texture is handed over.
    let stats = gpu.stats();
    assert_eq!((stats.textures, stats.framebuffers), (1, 0));

    let baked = renderer.take_ready().unwrap();
    drop(baked);
    let stats = gpu.stats();
    assert_eq!((stats.textures, stats.framebuffers, stats.fences), (0, 0, 0));
    assert_eq!(stats.foreign_deletes, 0);
    assert!(!gpu
        .events()
        .iter()
        .any(|e| matches!(e, GpuEvent::ForeignDelete { .. })));
}

#[test]
fn cancelling_a_finished_job_frees_texture_on_main() {
    let (gpu, quad, mut renderer) = setup(HeadlessConfig::default());
    renderer.start(job(&quad, inputs(FractalKind::Spider, 128, 64))).unwrap();
    assert!(matches!(wait(&mut renderer), PreRenderPoll::Ready));
    renderer.cancel();

    let stats = gpu.stats();
    assert_eq!((stats.textures, stats.framebuffers, stats.fences), (0, 0, 0));
    assert_eq!(stats.foreign_deletes, 0);
    drop(quad);
}

#[test]
fn panicked_worker_disables_prerendering() {
    let (gpu, quad, mut renderer) = setup(HeadlessConfig {
        panic_on_activation: true,
        ..HeadlessConfig::default()
    });
    renderer.start(job(&quad, inputs(FractalKind::Mandelbrot, 128, 64))).unwrap();
    assert!(matches!(
        wait(&mut renderer),
        PreRenderPoll::Failed(RenderError::WorkerPanicked)
    ));
    assert!(!renderer.has_context());
    assert_eq!(renderer.state(), JobState::Idle);
    assert!(matches!(
        renderer.start(job(&quad, inputs(FractalKind::Mandelbrot, 128, 64))),
        Err(RenderError::WorkerContextUnavailable)
    ));
    assert_eq!(gpu.stats().textures, 0);
}
