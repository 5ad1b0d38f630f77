use std::rc::Rc;
use std::thread;
use std::time::Duration;

use mesmer_core::uniforms::{U_CENTER, U_MAX_ITERATIONS, U_PAN, U_VIEW_ZOOM, U_ZOOM};
use mesmer_core::{FractalKind, InputEvent, Key, MouseButton, ScreenSize, UniformValue};
use mesmer_render::headless::{ContextRole, GpuEvent, HeadlessConfig, HeadlessContext, HeadlessGpu};
use mesmer_render::{Explorer, Mode, RenderError, Response, ShaderLibrary, ShaderSource};

const SIZE: ScreenSize = ScreenSize {
    width: 800,
    height: 600,
};

fn library() -> ShaderLibrary {
    let src = |label: &str, body: &str| {
        ShaderSource::new(label, format!("#version 460 core\n// {body}\n"))
    };
    ShaderLibrary {
        quad_vertex: src("quad.vert", "quad"),
        fractal_fragment: src("fractal.frag", "fractal"),
        background_fragment: src("background.frag", "background"),
        loading_fragment: src("loading.frag", "loading"),
        viewer_fragment: src("viewer.frag", "viewer"),
    }
}

fn explorer(config: HeadlessConfig) -> (Rc<HeadlessGpu>, Explorer<HeadlessContext>) {
    let gpu = Rc::new(HeadlessGpu::new(config));
    let ctx = gpu.shared_context();
    let explorer = Explorer::new(Rc::clone(&gpu), Some(ctx), library()).unwrap();
    (gpu, explorer)
}

fn enable_prerender(explorer: &mut Explorer<HeadlessContext>) {
    explorer.prerender.enabled = true;
    explorer.prerender.resolution = 256;
    explorer.prerender.tile_size = 64;
}

fn pump_until_settled(explorer: &mut Explorer<HeadlessContext>) {
    for _ in 0..5000 {
        explorer.frame(SIZE);
        if !matches!(explorer.mode(), Mode::PreRenderLoading(_)) {
            return;
        }
        thread::sleep(Duration::from_millis(1));
    }
    panic!("still loading");
}

fn worker_draw_count(gpu: &HeadlessGpu) -> usize {
    gpu.events()
        .iter()
        .filter(|e| {
            matches!(
                e,
                GpuEvent::Draw {
                    role: ContextRole::Worker,
                    ..
                }
            )
        })
        .count()
}

#[test]
fn starts_on_main_menu_with_background() {
    let (gpu, mut explorer) = explorer(HeadlessConfig::default());
    assert_eq!(explorer.mode(), Mode::MainMenu);
    assert_eq!(explorer.program_label(), Some("background.frag"));
    explorer.frame(SIZE);
    assert_eq!(gpu.stats().main_programs, 1);

    explorer.open_selection();
    assert_eq!(explorer.mode(), Mode::FractalSelection);
    explorer.back();
    assert_eq!(explorer.mode(), Mode::MainMenu);
}

#[test]
fn mandelbrot_live_binds_documented_defaults() {
    let (gpu, mut explorer) = explorer(HeadlessConfig::default());
    explorer.open_selection();
    explorer.select_fractal(FractalKind::Mandelbrot).unwrap();
    assert_eq!(explorer.mode(), Mode::FractalActive(FractalKind::Mandelbrot));

    explorer.frame(SIZE);
    assert_eq!(gpu.bound_uniform(U_CENTER), Some(UniformValue::DVec2([-0.75, 0.0])));
    assert_eq!(gpu.bound_uniform(U_ZOOM), Some(UniformValue::Double(1.0)));
    assert_eq!(gpu.bound_uniform(U_MAX_ITERATIONS), Some(UniformValue::Int(200)));
}

#[test]
fn burning_ship_selection_resets_view() {
    let (gpu, mut explorer) = explorer(HeadlessConfig::default());
    explorer.select_fractal(FractalKind::Mandelbrot).unwrap();
    explorer.handle_event(
        InputEvent::Wheel {
            position: (10.0, 10.0),
            delta: 5.0,
        },
        SIZE,
    );
    explorer.select_fractal(FractalKind::BurningShip).unwrap();
    explorer.frame(SIZE);
    assert_eq!(
        gpu.bound_uniform(U_CENTER),
        Some(UniformValue::DVec2([-1.75, -0.04]))
    );
    assert_eq!(gpu.bound_uniform(U_ZOOM), Some(UniformValue::Double(22.0)));
    assert_eq!(gpu.bound_uniform(U_MAX_ITERATIONS), Some(UniformValue::Int(663)));
}

#[test]
fn wheel_zooms_live_view_and_space_resets() {
    let (gpu, mut explorer) = explorer(HeadlessConfig::default());
    explorer.select_fractal(FractalKind::Julia).unwrap();
    let cursor = (400.0, 300.0);
    explorer.handle_event(
        InputEvent::Wheel {
            position: cursor,
            delta: 1.0,
        },
        SIZE,
    );
    assert!((explorer.viewport.zoom() - 0.7 * 1.1).abs() < 1e-12);
    assert_eq!(explorer.viewport.center, (0.0, 0.0), "zooming at the center keeps it");

    explorer.handle_event(InputEvent::Key(Key::ResetView), SIZE);
    explorer.frame(SIZE);
    assert_eq!(gpu.bound_uniform(U_ZOOM), Some(UniformValue::Double(0.7)));
}

#[test]
fn switching_kinds_never_holds_two_programs() {
    let (gpu, mut explorer) = explorer(HeadlessConfig::default());
    for _ in 0..3 {
        for kind in FractalKind::ALL {
            explorer.select_fractal(kind).unwrap();
            explorer.frame(SIZE);
            assert_eq!(gpu.stats().main_programs, 1);
        }
    }
    explorer.back();
    let stats = gpu.stats();
    assert_eq!(stats.main_programs, 1, "background only");
    assert_eq!(stats.peak_main_programs, 1);
}

#[test]
fn switching_kinds_while_prerendering_keeps_one_job_and_one_program() {
    let (gpu, mut explorer) = explorer(HeadlessConfig::default());
    enable_prerender(&mut explorer);
    explorer.open_selection();
    for (i, kind) in FractalKind::ALL.into_iter().cycle().take(25).enumerate() {
        explorer.select_fractal(kind).unwrap();
        assert_eq!(explorer.mode(), Mode::PreRenderLoading(kind));
        // Every third switch waits for the viewer; the rest interrupt loading.
        if i % 3 == 0 {
            pump_until_settled(&mut explorer);
            assert_eq!(explorer.mode(), Mode::PreRenderView(kind));
        } else {
            explorer.frame(SIZE);
        }
        let stats = gpu.stats();
        assert!(stats.textures <= 1, "textures = {}", stats.textures);
        assert_eq!(stats.main_programs, 1);
    }

    explorer.back();
    let stats = gpu.stats();
    assert_eq!(stats.peak_main_programs, 1);
    assert_eq!((stats.textures, stats.framebuffers, stats.fences), (0, 0, 0));
    assert_eq!(stats.foreign_deletes, 0);
}

#[test]
fn shader_failure_falls_back_to_background() {
    let (gpu, mut explorer) = explorer(HeadlessConfig {
        fail_fragment_containing: Some("KIND_NEWTON".into()),
        ..HeadlessConfig::default()
    });
    explorer.open_selection();
    explorer.select_fractal(FractalKind::Julia).unwrap();

    let err = explorer.select_fractal(FractalKind::Newton).unwrap_err();
    assert!(matches!(err, RenderError::ShaderCompile { .. }));
    assert_eq!(explorer.mode(), Mode::FractalSelection);
    assert_eq!(explorer.program_label(), Some("background.frag"));
    assert_eq!(gpu.stats().main_programs, 1);
    assert!(explorer.take_error().is_some());

    // Other kinds still work afterwards.
    explorer.select_fractal(FractalKind::Spider).unwrap();
    assert_eq!(explorer.mode(), Mode::FractalActive(FractalKind::Spider));
}

#[test]
fn idle_kind_cannot_be_selected() {
    let (_gpu, mut explorer) = explorer(HeadlessConfig::default());
    assert!(matches!(
        explorer.select_fractal(FractalKind::None),
        Err(RenderError::InvalidFractalKind)
    ));
    assert_eq!(explorer.mode(), Mode::MainMenu);
}

#[test]
fn prerender_flow_ends_in_viewer_and_back_frees_it() {
    let (gpu, mut explorer) = explorer(HeadlessConfig::default());
    enable_prerender(&mut explorer);
    explorer.select_fractal(FractalKind::Julia).unwrap();
    assert_eq!(explorer.mode(), Mode::PreRenderLoading(FractalKind::Julia));
    assert_eq!(explorer.program_label(), Some("loading.frag"));

    pump_until_settled(&mut explorer);
    assert_eq!(explorer.mode(), Mode::PreRenderView(FractalKind::Julia));
    assert_eq!(explorer.prerender_tiles(), (16, 16));
    let stats = gpu.stats();
    assert_eq!((stats.textures, stats.framebuffers, stats.fences), (1, 0, 0));
    assert_eq!(stats.peak_main_programs, 1);

    explorer.back();
    assert_eq!(explorer.mode(), Mode::MainMenu);
    let stats = gpu.stats();
    assert_eq!((stats.textures, stats.framebuffers, stats.fences), (0, 0, 0));
    assert_eq!(stats.programs, 1);
    assert_eq!(stats.foreign_deletes, 0);
}

#[test]
fn viewer_pan_and_zoom_do_not_rerender() {
    let (gpu, mut explorer) = explorer(HeadlessConfig::default());
    enable_prerender(&mut explorer);
    explorer.select_fractal(FractalKind::Lyapunov).unwrap();
    pump_until_settled(&mut explorer);
    let live_before = explorer.viewport;
    let draws_before = worker_draw_count(&gpu);

    explorer.handle_event(
        InputEvent::Wheel {
            position: (400.0, 300.0),
            delta: 2.0,
        },
        SIZE,
    );
    explorer.handle_event(
        InputEvent::MouseDown {
            position: (400.0, 300.0),
            button: MouseButton::Left,
        },
        SIZE,
    );
    explorer.handle_event(InputEvent::MouseMotion { position: (480.0, 300.0) }, SIZE);
    explorer.frame(SIZE);

    assert_eq!(worker_draw_count(&gpu), draws_before);
    assert_eq!(explorer.viewport, live_before);
    let Some(UniformValue::Float(zoom)) = gpu.bound_uniform(U_VIEW_ZOOM) else {
        panic!("viewer zoom not bound");
    };
    assert!((zoom - 1.21).abs() < 1e-5);
    let Some(UniformValue::Vec2(pan)) = gpu.bound_uniform(U_PAN) else {
        panic!("viewer pan not bound");
    };
    assert!(pan[0] < 0.0, "dragging right moves the view left");

    explorer.handle_event(InputEvent::Key(Key::ResetView), SIZE);
    assert_eq!(explorer.viewer().unwrap().view.zoom(), 1.0);
}

#[test]
fn prerender_failure_falls_back_to_live() {
    let (gpu, mut explorer) = explorer(HeadlessConfig {
        incomplete_framebuffer: true,
        ..HeadlessConfig::default()
    });
    enable_prerender(&mut explorer);
    explorer.select_fractal(FractalKind::Nova).unwrap();
    pump_until_settled(&mut explorer);

    assert_eq!(explorer.mode(), Mode::FractalActive(FractalKind::Nova));
    assert!(explorer.take_error().is_some());
    let stats = gpu.stats();
    assert_eq!((stats.textures, stats.framebuffers), (0, 0));
    assert_eq!(stats.main_programs, 1);
}

#[test]
fn back_while_loading_joins_worker_and_frees_resources() {
    let (gpu, mut explorer) = explorer(HeadlessConfig {
        release_delay: Duration::from_millis(40),
        ..HeadlessConfig::default()
    });
    enable_prerender(&mut explorer);
    explorer.select_fractal(FractalKind::Phoenix).unwrap();
    explorer.back();

    assert_eq!(explorer.mode(), Mode::MainMenu);
    assert!(explorer.can_prerender(), "context reclaimed");
    let stats = gpu.stats();
    assert_eq!((stats.textures, stats.framebuffers, stats.fences), (0, 0, 0));
    assert_eq!(stats.programs, 1, "background only");
    assert_eq!(stats.vertex_arrays, 1);
}

#[test]
fn prerender_current_view_uses_live_parameters() {
    let (_gpu, mut explorer) = explorer(HeadlessConfig::default());
    explorer.prerender.resolution = 128;
    explorer.prerender.tile_size = 64;
    explorer.select_fractal(FractalKind::Mandelbrot).unwrap();
    explorer.handle_event(
        InputEvent::Wheel {
            position: (100.0, 100.0),
            delta: 3.0,
        },
        SIZE,
    );
    let zoom = explorer.viewport.zoom();
    let center = explorer.viewport.center;

    explorer.prerender_current_view().unwrap();
    pump_until_settled(&mut explorer);
    assert_eq!(explorer.mode(), Mode::PreRenderView(FractalKind::Mandelbrot));
    let baked = explorer.viewer().unwrap().texture().inputs();
    assert_eq!(baked.zoom, zoom);
    assert_eq!(baked.center, center);
    assert_eq!(baked.resolution, 128);
}

#[test]
fn export_only_from_viewer() {
    let (_gpu, mut explorer) = explorer(HeadlessConfig::default());
    let path = std::env::temp_dir().join("mesmer_session_export.png");
    assert!(matches!(
        explorer.export_prerender(&path),
        Err(RenderError::NothingToExport)
    ));
    assert_eq!(
        explorer.handle_event(InputEvent::Key(Key::Export), SIZE),
        Response::Continue
    );

    enable_prerender(&mut explorer);
    explorer.select_fractal(FractalKind::Tricorn).unwrap();
    pump_until_settled(&mut explorer);
    assert_eq!(
        explorer.handle_event(InputEvent::Key(Key::Export), SIZE),
        Response::Export
    );
    explorer.export_prerender(&path).unwrap();
    assert!(path.exists());
    let _ = std::fs::remove_file(&path);
}

#[test]
fn missing_worker_context_renders_live() {
    let gpu = Rc::new(HeadlessGpu::new(HeadlessConfig::default()));
    let mut explorer: Explorer<HeadlessContext> =
        Explorer::new(Rc::clone(&gpu), None, library()).unwrap();
    assert!(!explorer.can_prerender());
    enable_prerender(&mut explorer);
    explorer.select_fractal(FractalKind::Multibrot).unwrap();
    assert_eq!(explorer.mode(), Mode::FractalActive(FractalKind::Multibrot));
    assert!(explorer.take_error().is_some());
}

#[test]
fn close_requests_quit() {
    let (_gpu, mut explorer) = explorer(HeadlessConfig::default());
    assert_eq!(explorer.handle_event(InputEvent::Close, SIZE), Response::Quit);
}
